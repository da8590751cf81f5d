//! File tools confined to a workspace directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use planloop_core::error::ToolError;
use planloop_core::tool::{
    ContextItem, Handler, ParamType, Tool, ToolArgs, ToolParameter, ToolReturn,
};
use serde_json::json;
use tracing::debug;

/// Root directory the file tools may touch.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a workspace-relative path to a real path. Absolute paths and
    /// parent components are refused.
    pub fn resolve(&self, tool: &str, relative: &str) -> Result<PathBuf, ToolError> {
        let rel = Path::new(relative.trim());
        if rel.as_os_str().is_empty() {
            return Err(ToolError::invalid_arguments(tool, "path is empty"));
        }
        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => {
                    return Err(ToolError::invalid_arguments(
                        tool,
                        format!("'{relative}' leaves the workspace"),
                    ))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::invalid_arguments(
                        tool,
                        format!("'{relative}' must be relative to the workspace"),
                    ))
                }
            }
        }
        Ok(self.root.join(rel))
    }
}

fn str_arg<'a>(tool: &str, args: &'a ToolArgs, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::invalid_arguments(tool, format!("'{name}' must be a string")))
}

pub fn read_file_tool(workspace: Arc<Workspace>) -> Tool {
    Tool::builder("read_file", "Read a file and return its contents")
        .alias("open_file")
        .parameter(ToolParameter::required(
            "filename",
            ParamType::String,
            "The path of the file to read",
        ))
        .handler(Handler::asynchronous(move |args, _ctx| {
            let workspace = Arc::clone(&workspace);
            async move {
                let filename = str_arg("read_file", &args, "filename")?;
                let path = workspace.resolve("read_file", filename)?;
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    ToolError::execution(format!("Cannot read {filename}: {e}"))
                        .with_hint("Use list_folder to see which files exist.")
                })?;
                debug!(path = ?path, bytes = content.len(), "file read");
                let item = ContextItem::new(format!("Contents of {filename}"), content.clone())
                    .with_source(filename);
                Ok(ToolReturn::new(content).with_context_item(item))
            }
        }))
}

pub fn write_file_tool(workspace: Arc<Workspace>) -> Tool {
    Tool::builder("write_file", "Write a file, creating it if necessary")
        .alias("write_to_file")
        .parameter(ToolParameter::required(
            "filename",
            ParamType::String,
            "The name of the file to write to",
        ))
        .parameter(ToolParameter::required(
            "contents",
            ParamType::String,
            "The contents to write to the file",
        ))
        .handler(Handler::asynchronous(move |args, _ctx| {
            let workspace = Arc::clone(&workspace);
            async move {
                let filename = str_arg("write_file", &args, "filename")?;
                let contents = str_arg("write_file", &args, "contents")?;
                let path = workspace.resolve("write_file", filename)?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, contents).await?;
                debug!(path = ?path, bytes = contents.len(), "file written");
                Ok(ToolReturn::new(format!(
                    "File {filename} has been written successfully."
                )))
            }
        }))
}

pub fn list_folder_tool(workspace: Arc<Workspace>) -> Tool {
    Tool::builder("list_folder", "List the items in a folder")
        .parameter(ToolParameter::required(
            "folder",
            ParamType::String,
            "The folder to list files in",
        ))
        .handler(Handler::asynchronous(move |args, _ctx| {
            let workspace = Arc::clone(&workspace);
            async move {
                let folder = str_arg("list_folder", &args, "folder")?;
                let dir = workspace.resolve("list_folder", folder)?;
                let files = list_files(workspace.root(), &dir).await.map_err(|e| {
                    ToolError::execution(format!("Cannot list {folder}: {e}"))
                })?;
                Ok(ToolReturn::new(json!(files)))
            }
        }))
}

/// Files under `dir`, recursively, as sorted workspace-relative paths.
async fn list_files(root: &Path, dir: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if let Ok(rel) = path.strip_prefix(root) {
                files.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    files.sort();
    Ok(files)
}
