/// Location and key helpers / 存储位置与对象键工具函数

/// Normalize a storage location to a bare bucket name / 规范化存储位置为桶名
/// 1. Strip any URI scheme (`s3://`, `quilt+s3://`) / 去掉URI协议前缀
/// 2. Drop fragment and query parts / 去掉片段与查询参数
/// 3. Keep only the first path segment, without trailing separators / 只保留第一段
pub fn normalize_location(location: &str) -> String {
    let location = location.trim();
    let rest = match location.find("://") {
        Some(pos) => &location[pos + 3..],
        None => location,
    };
    let rest = rest.split(['#', '?']).next().unwrap_or("");
    rest.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Get file extension (lowercase, without dot) / 获取文件扩展名
pub fn get_ext(key: &str) -> String {
    std::path::Path::new(file_name(key))
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Last segment of an object key / 对象键的最后一段
pub fn file_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Truncate to at most `max_chars` characters on a char boundary / 按字符截断
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((pos, _)) => text[..pos].to_string(),
        None => text.to_string(),
    }
}
