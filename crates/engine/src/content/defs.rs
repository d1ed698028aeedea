use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use serde_json::Value;
use tracing::{debug, info};

use crate::app::{is_reserved_attribute, AttributeValue, Attributes};

const DEFAULT_STATE: &str = "idle";
const DEFAULT_SIZE: f32 = 32.0;

/// Data-driven entity preset, registered into
/// [`EntityRegistry`](crate::app::EntityRegistry) by name.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    pub name: String,
    pub kind: String,
    pub sprite: Option<String>,
    pub state: String,
    pub width: f32,
    pub height: f32,
    pub default_id: Option<String>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefsErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInFile,
}

#[derive(Debug, Clone)]
pub struct DefsCompileError {
    pub code: DefsErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for DefsCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for DefsCompileError {}

/// Compiles every `*.xml` file under `defs_dir`, in sorted relative-path
/// order. A later file redefining a name replaces the earlier definition.
/// A missing directory yields no definitions.
pub fn compile_entity_defs(defs_dir: &Path) -> Result<Vec<EntityDef>, DefsCompileError> {
    if !defs_dir.is_dir() {
        debug!(path = %defs_dir.display(), "defs_dir_missing");
        return Ok(Vec::new());
    }

    let xml_files = collect_xml_files_sorted(defs_dir)
        .map_err(|error| read_error(error.path, error.source))?;
    let mut merged = BTreeMap::<String, EntityDef>::new();
    for xml_file in &xml_files {
        let raw = fs::read_to_string(xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        for def in parse_defs_document(xml_file, &raw)? {
            if merged.insert(def.name.clone(), def).is_some() {
                debug!(file = %xml_file.display(), "entity_def_overridden");
            }
        }
    }

    info!(
        files = xml_files.len(),
        defs = merged.len(),
        "entity_defs_compiled"
    );
    Ok(merged.into_values().collect())
}

pub fn parse_defs_document(file_path: &Path, raw: &str) -> Result<Vec<EntityDef>, DefsCompileError> {
    let doc = Document::parse(raw).map_err(|error| DefsCompileError {
        code: DefsErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = NodeContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error(
            DefsErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut seen = HashSet::<String>::new();
    let mut defs = Vec::<EntityDef>::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "EntityDef" {
            return Err(ctx.error(
                DefsErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; only <EntityDef> is supported",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        let def = parse_entity_def(&ctx, child)?;
        if !seen.insert(def.name.clone()) {
            return Err(ctx.error(
                DefsErrorCode::DuplicateDefInFile,
                format!("duplicate EntityDef '{}' in one file", def.name),
                child,
            ));
        }
        defs.push(def);
    }
    Ok(defs)
}

struct NodeContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl NodeContext<'_, '_> {
    fn error(&self, code: DefsErrorCode, message: String, node: Node<'_, '_>) -> DefsCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        DefsCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_text(&self, node: Node<'_, '_>, field_name: &str) -> Result<String, DefsCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error(
                DefsErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn positive_number(&self, node: Node<'_, '_>, field_name: &str) -> Result<f32, DefsCompileError> {
        let value = self.required_text(node, field_name)?;
        match value.parse::<f32>() {
            Ok(parsed) if parsed.is_finite() && parsed > 0.0 => Ok(parsed),
            _ => Err(self.error(
                DefsErrorCode::InvalidValue,
                format!("{field_name} '{value}' must be a positive number"),
                node,
            )),
        }
    }
}

fn parse_entity_def(ctx: &NodeContext<'_, '_>, node: Node<'_, '_>) -> Result<EntityDef, DefsCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut name = None;
    let mut kind = None;
    let mut sprite = None;
    let mut state = None;
    let mut width = None;
    let mut height = None;
    let mut default_id = None;
    let mut attributes = Attributes::new();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(ctx.error(
                DefsErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <EntityDef>"),
                field,
            ));
        }

        match field_name.as_str() {
            "name" => name = Some(ctx.required_text(field, "name")?),
            "kind" => kind = Some(ctx.required_text(field, "kind")?),
            "sprite" => sprite = Some(ctx.required_text(field, "sprite")?),
            "state" => state = Some(ctx.required_text(field, "state")?),
            "defaultId" => default_id = Some(ctx.required_text(field, "defaultId")?),
            "width" => width = Some(ctx.positive_number(field, "width")?),
            "height" => height = Some(ctx.positive_number(field, "height")?),
            "attributes" => attributes = parse_attributes(ctx, field)?,
            _ => {
                return Err(ctx.error(
                    DefsErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <EntityDef>"),
                    field,
                ))
            }
        }
    }

    let Some(name) = name else {
        return Err(ctx.error(
            DefsErrorCode::MissingField,
            "missing required field <name> in <EntityDef>".to_string(),
            node,
        ));
    };
    let Some(kind) = kind else {
        return Err(ctx.error(
            DefsErrorCode::MissingField,
            "missing required field <kind> in <EntityDef>".to_string(),
            node,
        ));
    };

    Ok(EntityDef {
        name,
        kind,
        sprite,
        state: state.unwrap_or_else(|| DEFAULT_STATE.to_string()),
        width: width.unwrap_or(DEFAULT_SIZE),
        height: height.unwrap_or(DEFAULT_SIZE),
        default_id,
        attributes,
    })
}

fn parse_attributes(ctx: &NodeContext<'_, '_>, node: Node<'_, '_>) -> Result<Attributes, DefsCompileError> {
    let mut attributes = Attributes::new();
    for attr in node.children().filter(|child| child.is_element()) {
        if attr.tag_name().name() != "attr" {
            return Err(ctx.error(
                DefsErrorCode::UnknownField,
                format!("unknown field <{}> in <attributes>", attr.tag_name().name()),
                attr,
            ));
        }
        let Some(key) = attr.attribute("key").map(str::trim).filter(|key| !key.is_empty()) else {
            return Err(ctx.error(
                DefsErrorCode::MissingField,
                "<attr> requires a non-empty key".to_string(),
                attr,
            ));
        };
        if is_reserved_attribute(key) {
            return Err(ctx.error(
                DefsErrorCode::InvalidValue,
                format!("attribute '{key}' is positional; use <width>/<height> or level placement"),
                attr,
            ));
        }
        let raw = attr.text().map(str::trim).unwrap_or_default();
        let value = parse_attr_value(attr.attribute("type").unwrap_or("string"), raw)
            .map_err(|message| ctx.error(DefsErrorCode::InvalidValue, message, attr))?;
        if attributes.insert(key.to_string(), value).is_some() {
            return Err(ctx.error(
                DefsErrorCode::DuplicateField,
                format!("duplicate attribute '{key}'"),
                attr,
            ));
        }
    }
    Ok(attributes)
}

fn parse_attr_value(kind: &str, raw: &str) -> Result<AttributeValue, String> {
    match kind {
        "string" => Ok(Value::from(raw)),
        "bool" => raw
            .parse::<bool>()
            .map(Value::from)
            .map_err(|_| format!("'{raw}' is not a bool")),
        "number" => {
            if let Ok(integer) = raw.parse::<i64>() {
                return Ok(Value::from(integer));
            }
            raw.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("'{raw}' is not a finite number"))
        }
        other => Err(format!(
            "unknown attribute type '{other}'; allowed: string, number, bool"
        )),
    }
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_cached_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path.as_path())));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> DefsCompileError {
    DefsCompileError {
        code: DefsErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        file_path: path,
        location: None,
    }
}
