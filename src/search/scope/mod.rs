//! Scope handlers - route a scope to backend targets and parse its hits / 搜索范围处理
//!
//! Handlers are stateless and built once; a handler only ever returns
//! results of its own entity types.

mod file;
mod global;
mod packages;

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::schema::{QueryExpression, RawHit, ResultType, SearchResult, TargetSpec};
use super::Scope;
use crate::backend::BackendKind;
use crate::error::SearchError;
use crate::utils::{file_name, get_ext, truncate_chars};

pub use file::FileScope;
pub use global::GlobalScope;
pub use packages::PackagesScope;

/// Content type reported for package manifests / 包清单的内容类型
pub const MANIFEST_CONTENT_TYPE: &str = "application/jsonl";
pub const MANIFEST_EXTENSION: &str = "jsonl";

/// Options shared by every parse call of one request / 解析选项
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    pub backend: BackendKind,
    pub include_metadata: bool,
    /// Preview length when content previews were requested / 内容预览长度
    pub preview_chars: Option<usize>,
}

/// Scope handler trait / 范围处理器
pub trait ScopeHandler: Send + Sync {
    /// Scope this handler was registered for / 处理器对应的范围
    fn scope(&self) -> Scope;

    /// Handler name shown in explanations / 处理器名称
    fn name(&self) -> &'static str;

    /// Index pattern and bucket list for the given locations / 构建查询目标
    fn build_targets(&self, locations: &BTreeSet<String>) -> Result<TargetSpec, SearchError>;

    /// Query expression around an already escaped query / 构建查询表达式
    fn build_query_filter(&self, escaped: &str) -> QueryExpression;

    /// Parse one hit; `None` drops it / 解析单个命中
    fn parse_result(&self, hit: &RawHit, location: &str, ctx: &ParseContext) -> Option<SearchResult>;

    fn expected_result_types(&self) -> &'static [ResultType];

    /// Whether `None` from `parse_result` is a normal rejection rather than
    /// a parsing anomaly / 是否按设计拒绝
    fn rejects_by_design(&self) -> bool;
}

/// All handlers, built once from config / 处理器注册表
pub struct ScopeHandlers {
    bucket: FileScope,
    file: FileScope,
    packages: PackagesScope,
    global: GlobalScope,
}

impl ScopeHandlers {
    pub fn new(package_index_suffix: &str) -> Self {
        Self {
            bucket: FileScope::new(Scope::Bucket),
            file: FileScope::new(Scope::File),
            packages: PackagesScope::new(package_index_suffix),
            global: GlobalScope::new(package_index_suffix),
        }
    }

    /// Handler for a scope; `bucket` and `file` both use the file handler
    pub fn get(&self, scope: Scope) -> &dyn ScopeHandler {
        match scope {
            Scope::Global => &self.global,
            Scope::Packages => &self.packages,
            Scope::Bucket => &self.bucket,
            Scope::File => &self.file,
        }
    }
}

/// Index document shape, decided by field presence / 文档形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Plain object in a bucket index
    Object,
    /// Object whose latest version is a delete marker; never a result
    DeleteMarker,
    /// Package manifest (one package version)
    Manifest,
    /// File entry inside a package
    Entry,
    Unknown,
}

pub fn classify_document(source: &Value) -> DocumentShape {
    let has = |field: &str| source.get(field).map_or(false, |v| !v.is_null());

    if has("entry_lk") || has("entry_pk") {
        DocumentShape::Entry
    } else if has("ptr_name") && has("mnfst_hash") {
        DocumentShape::Manifest
    } else if has("key") && source.get("delete_marker").and_then(Value::as_bool) == Some(true) {
        DocumentShape::DeleteMarker
    } else if has("key") {
        DocumentShape::Object
    } else {
        DocumentShape::Unknown
    }
}

fn str_field<'a>(source: &'a Value, name: &str) -> &'a str {
    source.get(name).and_then(Value::as_str).unwrap_or("")
}

fn u64_field(source: &Value, name: &str) -> u64 {
    source.get(name).and_then(Value::as_u64).unwrap_or(0)
}

fn guess_content_type(source: &Value, key: &str) -> String {
    match str_field(source, "content_type") {
        "" => mime_guess::from_path(key).first_or_octet_stream().to_string(),
        ct => ct.to_string(),
    }
}

fn preview(source: &Value, ctx: &ParseContext) -> Option<String> {
    let max = ctx.preview_chars?;
    let content = str_field(source, "content");
    if content.is_empty() {
        None
    } else {
        Some(truncate_chars(content, max))
    }
}

/// Object document → file result / 对象文档转文件结果
pub(crate) fn parse_object(hit: &RawHit, location: &str, ctx: &ParseContext) -> Option<SearchResult> {
    let source = &hit.source;
    let key = str_field(source, "key");
    if key.is_empty() || location.is_empty() {
        return None;
    }
    if source.get("delete_marker").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }

    let version_id = str_field(source, "version_id");
    let mut id = format!("s3://{}/{}", location, key);
    if !version_id.is_empty() {
        id.push_str("?versionId=");
        id.push_str(version_id);
    }

    let mut metadata = Map::new();
    if ctx.include_metadata {
        for field in ["etag", "version_id"] {
            if let Some(v) = source.get(field).filter(|v| !v.is_null()) {
                metadata.insert(field.to_string(), v.clone());
            }
        }
        if let Some(Value::Object(user)) = source.get("user_meta") {
            metadata.insert("user_meta".to_string(), Value::Object(user.clone()));
        }
    }

    Some(SearchResult {
        id,
        result_type: ResultType::File,
        name: key.to_string(),
        title: file_name(key).to_string(),
        description: format!("Object in s3://{}", location),
        score: hit.score,
        backend: ctx.backend,
        location: location.to_string(),
        size: u64_field(source, "size"),
        last_modified: str_field(source, "last_modified").to_string(),
        content_type: guess_content_type(source, key),
        extension: get_ext(key),
        content_preview: preview(source, ctx),
        metadata,
    })
}

/// Manifest document → package result / 清单文档转包结果
pub(crate) fn parse_manifest(hit: &RawHit, location: &str, ctx: &ParseContext) -> Option<SearchResult> {
    let source = &hit.source;
    let name = str_field(source, "ptr_name");
    let hash = str_field(source, "mnfst_hash");
    if name.is_empty() || hash.is_empty() || location.is_empty() {
        return None;
    }

    let stats = source.get("mnfst_stats").cloned().unwrap_or(Value::Null);
    let mut metadata = Map::new();
    metadata.insert("hash".to_string(), Value::from(hash));
    metadata.insert("tag".to_string(), Value::from(str_field(source, "ptr_tag")));
    metadata.insert("total_entries".to_string(), Value::from(u64_field(&stats, "total_files")));
    metadata.insert("total_bytes".to_string(), Value::from(u64_field(&stats, "total_bytes")));
    if ctx.include_metadata {
        if let Some(Value::Object(user)) = source.get("mnfst_metadata") {
            if !user.is_empty() {
                metadata.insert("user_meta".to_string(), Value::Object(user.clone()));
            }
        }
    }

    let description = match str_field(source, "mnfst_message") {
        "" => format!("Package {} in {}", name, location),
        message => message.to_string(),
    };

    Some(SearchResult {
        id: format!("quilt+s3://{}#package={}@{}", location, name, hash),
        result_type: ResultType::Package,
        name: name.to_string(),
        title: name.to_string(),
        description,
        score: hit.score,
        backend: ctx.backend,
        location: location.to_string(),
        size: u64_field(source, "mnfst_size"),
        last_modified: str_field(source, "mnfst_last_modified").to_string(),
        content_type: MANIFEST_CONTENT_TYPE.to_string(),
        extension: MANIFEST_EXTENSION.to_string(),
        content_preview: None,
        metadata,
    })
}

/// Entry document → file result addressed by its physical key / 条目文档转文件结果
pub(crate) fn parse_entry(hit: &RawHit, location: &str, ctx: &ParseContext) -> Option<SearchResult> {
    let source = &hit.source;
    let logical_key = str_field(source, "entry_lk");
    let physical_key = str_field(source, "entry_pk");

    // s3://bucket/key[?versionId=...]
    let (bucket, key) = match physical_key.strip_prefix("s3://").and_then(|rest| rest.split_once('/')) {
        Some((bucket, rest)) => (bucket, rest.split('?').next().unwrap_or(rest)),
        None => (location, logical_key),
    };
    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    let id = if physical_key.starts_with("s3://") {
        physical_key.to_string()
    } else {
        format!("s3://{}/{}", bucket, key)
    };
    let name = if logical_key.is_empty() { key } else { logical_key };

    let mut metadata = Map::new();
    if ctx.include_metadata {
        metadata.insert("logical_key".to_string(), Value::from(logical_key));
        metadata.insert("physical_key".to_string(), Value::from(physical_key));
        if let Some(hash) = source.get("entry_hash").filter(|v| !v.is_null()) {
            metadata.insert("entry_hash".to_string(), hash.clone());
        }
        if let Some(package_hash) = source.get("mnfst_hash").filter(|v| !v.is_null()) {
            metadata.insert("package_hash".to_string(), package_hash.clone());
        }
    }

    Some(SearchResult {
        id,
        result_type: ResultType::File,
        name: name.to_string(),
        title: file_name(name).to_string(),
        description: format!("Package entry in s3://{}", location),
        score: hit.score,
        backend: ctx.backend,
        location: bucket.to_string(),
        size: u64_field(source, "entry_size"),
        last_modified: str_field(source, "mnfst_last_modified").to_string(),
        content_type: guess_content_type(source, key),
        extension: get_ext(key),
        content_preview: None,
        metadata,
    })
}
