//! Static evaluation of `manifest.py` descriptors

use super::lexer::Lexer;
use super::parser::{Call, Parser, Stmt, Value};
use super::{is_url, substitute_vars, ManifestReader, PathVars, LIB_DIR_VAR, MANIFEST_FILE_NAME};
use crate::error::{BuildError, BuildResult};
use crate::targets::{FileTarget, FileType, Metadata, OptLevel, SOURCE_SUFFIX};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Library directory searched first by `require(..., unix_ffi=True)`
const UNIX_FFI_DIR: &str = "unix-ffi";

/// Everything a manifest evaluation produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestContents {
    /// Files to compile, in manifest order
    pub files: Vec<FileTarget>,
    /// Packages named by `require()`, in order of appearance
    pub dependencies: Vec<String>,
    /// Metadata of the top-level manifest
    pub metadata: Metadata,
}

/// Reader for `manifest.py` files in compile mode
///
/// `require()` resolves the named package (so a missing dependency is
/// reported) but does not pull its files in; each package is built from its
/// own manifest.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    require_dirs: Vec<String>,
}

impl Default for ManifestFile {
    fn default() -> Self {
        Self {
            require_dirs: vec![
                "micropython".to_string(),
                "python-stdlib".to_string(),
                "python-ecosys".to_string(),
            ],
        }
    }
}

impl ManifestFile {
    /// Create a reader with the default `require()` search order
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a manifest and everything it includes
    pub fn evaluate(&self, manifest_path: &Path, vars: &PathVars) -> BuildResult<ManifestContents> {
        let mut evaluation = Evaluation {
            vars,
            require_dirs: &self.require_dirs,
            contents: ManifestContents::default(),
            metadata: Metadata::new(),
            visited: HashSet::new(),
        };
        evaluation.include(manifest_path, BTreeMap::new())?;

        // Metadata applies to every file, wherever metadata() appears
        let Evaluation {
            mut contents,
            metadata,
            ..
        } = evaluation;
        for file in &mut contents.files {
            file.metadata = metadata.clone();
        }
        contents.metadata = metadata;
        Ok(contents)
    }
}

impl ManifestReader for ManifestFile {
    fn read(&self, manifest_path: &Path, vars: &PathVars) -> BuildResult<Vec<FileTarget>> {
        Ok(self.evaluate(manifest_path, vars)?.files)
    }
}

/// State of one manifest being executed
struct Frame {
    path: PathBuf,
    dir: PathBuf,
    options: BTreeMap<String, Value>,
}

impl Frame {
    fn error(&self, call: &Call, message: impl Into<String>) -> BuildError {
        BuildError::manifest_parse(&self.path, call.line, message)
    }

    /// Resolve a path argument relative to this manifest
    fn resolve(&self, path: &str, vars: &PathVars) -> Result<PathBuf, String> {
        let expanded = substitute_vars(path, vars)?;
        if is_url(&expanded) {
            return Ok(PathBuf::from(expanded));
        }
        Ok(normalize(&self.dir.join(expanded)))
    }

    fn option(&self, name: &str) -> bool {
        self.options.get(name).is_some_and(Value::is_truthy)
    }
}

struct Evaluation<'a> {
    vars: &'a PathVars,
    require_dirs: &'a [String],
    contents: ManifestContents,
    /// Shared by a manifest and everything it includes
    metadata: Metadata,
    visited: HashSet<PathBuf>,
}

impl Evaluation<'_> {
    /// Execute one manifest file
    fn include(
        &mut self,
        manifest_path: &Path,
        options: BTreeMap<String, Value>,
    ) -> BuildResult<()> {
        let key = fs::canonicalize(manifest_path).unwrap_or_else(|_| manifest_path.to_path_buf());
        if !self.visited.insert(key) {
            debug!("Manifest {} already included", manifest_path.display());
            return Ok(());
        }

        let source = fs::read_to_string(manifest_path)
            .map_err(|e| BuildError::manifest_read(manifest_path, e))?;
        let tokens = Lexer::new(&source)
            .tokenize()
            .map_err(|e| BuildError::manifest_parse(manifest_path, e.line, e.message))?;
        let statements = Parser::new(tokens)
            .parse()
            .map_err(|e| BuildError::manifest_parse(manifest_path, e.line, e.message))?;

        let mut frame = Frame {
            path: manifest_path.to_path_buf(),
            dir: manifest_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            options,
        };
        self.execute(&mut frame, &statements)
    }

    fn execute(&mut self, frame: &mut Frame, statements: &[Stmt]) -> BuildResult<()> {
        for statement in statements {
            match statement {
                Stmt::Pass => {}
                Stmt::If {
                    condition,
                    body,
                    orelse,
                } => {
                    let taken = frame.option(&condition.option) != condition.negated;
                    self.execute(frame, if taken { body } else { orelse })?;
                }
                Stmt::Call(call) => self.call(frame, call)?,
            }
        }
        Ok(())
    }

    fn call(&mut self, frame: &mut Frame, call: &Call) -> BuildResult<()> {
        match call.callee.as_str() {
            "metadata" => self.metadata(frame, call),
            "module" => self.module(frame, call),
            "package" => self.package(frame, call),
            "require" => self.require(frame, call),
            "include" => self.include_call(frame, call),
            "options.defaults" => {
                let bound = Bound::new(call, &[], true).map_err(|m| frame.error(call, m))?;
                for (name, value) in bound.extra {
                    frame.options.entry(name).or_insert(value);
                }
                Ok(())
            }
            "freeze" | "freeze_as_str" | "freeze_as_mpy" | "freeze_mpy" | "add_library" => Err(
                frame.error(call, format!("{}() is not supported when compiling", call.callee)),
            ),
            other => Err(frame.error(call, format!("unsupported statement '{}'", other))),
        }
    }

    fn metadata(&mut self, frame: &mut Frame, call: &Call) -> BuildResult<()> {
        let bound = Bound::new(call, &["description", "version", "license", "author"], true)
            .map_err(|m| frame.error(call, m))?;
        for (name, value) in bound.values.into_iter().chain(bound.extra) {
            if let Some(text) = value.to_text() {
                self.metadata.insert(name, text);
            }
        }
        Ok(())
    }

    fn module(&mut self, frame: &mut Frame, call: &Call) -> BuildResult<()> {
        let bound = Bound::new(call, &["module_path", "base_path", "opt"], false)
            .map_err(|m| frame.error(call, m))?;
        let module_path = bound.required_str("module_path").map_err(|m| frame.error(call, m))?;
        let base_path = bound.str_or("base_path", ".").map_err(|m| frame.error(call, m))?;
        let opt = bound.opt().map_err(|m| frame.error(call, m))?;

        if !module_path.ends_with(SOURCE_SUFFIX) {
            return Err(frame.error(call, "module must be .py file"));
        }

        let base = frame.resolve(base_path, self.vars).map_err(|m| frame.error(call, m))?;
        self.add_file(base.join(module_path), module_path.to_string(), opt);
        Ok(())
    }

    fn package(&mut self, frame: &mut Frame, call: &Call) -> BuildResult<()> {
        let bound = Bound::new(call, &["package_path", "files", "base_path", "opt"], false)
            .map_err(|m| frame.error(call, m))?;
        let package_path = bound
            .required_str("package_path")
            .map_err(|m| frame.error(call, m))?
            .trim_end_matches('/');
        let base_path = bound.str_or("base_path", ".").map_err(|m| frame.error(call, m))?;
        let opt = bound.opt().map_err(|m| frame.error(call, m))?;
        let base = frame.resolve(base_path, self.vars).map_err(|m| frame.error(call, m))?;

        if let Some(files) = bound.get("files") {
            let Value::List(files) = files else {
                return Err(frame.error(call, "files must be a list of paths"));
            };
            for file in files {
                let Value::Str(file) = file else {
                    return Err(frame.error(call, "files must be a list of paths"));
                };
                self.add_file(
                    base.join(package_path).join(file),
                    format!("{}/{}", package_path, file),
                    opt,
                );
            }
            return Ok(());
        }

        let root = base.join(package_path);
        if !root.is_dir() {
            return Err(frame.error(
                call,
                format!("package directory not found: {}", root.display()),
            ));
        }
        for entry in WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("py") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&base) else {
                continue;
            };
            let target_path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            self.add_file(path.to_path_buf(), target_path, opt);
        }
        Ok(())
    }

    fn require(&mut self, frame: &mut Frame, call: &Call) -> BuildResult<()> {
        let bound = Bound::new(
            call,
            &["name", "version", "unix_ffi", "pypi", "library"],
            true,
        )
        .map_err(|m| frame.error(call, m))?;
        let name = bound.required_str("name").map_err(|m| frame.error(call, m))?;

        if let Some(library) = bound.get("library") {
            return Err(frame.error(
                call,
                format!(
                    "require() from library {:?} is not supported",
                    library.to_text().unwrap_or_default()
                ),
            ));
        }
        let lib_dir = self.vars.get(LIB_DIR_VAR).ok_or_else(|| {
            frame.error(call, format!("require() needs the {} variable", LIB_DIR_VAR))
        })?;

        let mut search: Vec<&str> = Vec::new();
        if bound.get("unix_ffi").is_some_and(Value::is_truthy) {
            search.push(UNIX_FFI_DIR);
        }
        search.extend(self.require_dirs.iter().map(String::as_str));

        let found = search
            .iter()
            .find_map(|dir| find_package(&Path::new(lib_dir).join(dir), name));
        match found {
            Some(path) => {
                debug!("{} requires {} ({})", frame.path.display(), name, path.display());
                if !self.contents.dependencies.iter().any(|d| d == name) {
                    self.contents.dependencies.push(name.to_string());
                }
                Ok(())
            }
            None => Err(frame.error(call, format!("package {} not found", name))),
        }
    }

    fn include_call(&mut self, frame: &mut Frame, call: &Call) -> BuildResult<()> {
        let bound = Bound::new(call, &["manifest_path", "is_require"], true)
            .map_err(|m| frame.error(call, m))?;
        let paths: Vec<&str> = match bound.get("manifest_path") {
            Some(Value::Str(path)) => vec![path.as_str()],
            Some(Value::List(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Str(path) => Ok(path.as_str()),
                    _ => Err(frame.error(call, "include() paths must be strings")),
                })
                .collect::<BuildResult<_>>()?,
            _ => return Err(frame.error(call, "include() needs a manifest path")),
        };

        for path in paths {
            let mut resolved = frame.resolve(path, self.vars).map_err(|m| frame.error(call, m))?;
            if resolved.is_dir() {
                resolved = resolved.join(MANIFEST_FILE_NAME);
            }
            self.include(&resolved, bound.extra.clone())?;
        }
        Ok(())
    }

    fn add_file(
        &mut self,
        full_path: PathBuf,
        target_path: String,
        opt: Option<OptLevel>,
    ) {
        let file_type = if is_url(&full_path.to_string_lossy()) {
            FileType::Other
        } else {
            FileType::Local
        };
        self.contents.files.push(
            FileTarget::local(target_path, full_path)
                .with_file_type(file_type)
                .with_opt(opt),
        );
    }
}

/// Find `<root>/**/<name>/manifest.py`
fn find_package(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.file_name() == name)
        .map(|e| e.path().join(MANIFEST_FILE_NAME))
        .find(|manifest| manifest.is_file())
}

/// Drop `.` components and fold `..` into a preceding normal component
///
/// Leading `..` components of a relative path are kept, and `..` directly
/// under the root stays at the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Call arguments matched against a parameter list
struct Bound {
    values: BTreeMap<String, Value>,
    extra: BTreeMap<String, Value>,
}

impl Bound {
    fn new(call: &Call, params: &[&str], accept_extra: bool) -> Result<Self, String> {
        if call.args.len() > params.len() {
            return Err(format!(
                "{}() takes at most {} positional arguments ({} given)",
                call.callee,
                params.len(),
                call.args.len()
            ));
        }

        let mut values: BTreeMap<String, Value> = params
            .iter()
            .zip(&call.args)
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let mut extra = BTreeMap::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for (name, value) in &call.kwargs {
            if !seen.insert(name.as_str()) {
                return Err(format!("{}() got keyword argument '{}' twice", call.callee, name));
            }
            if params.contains(&name.as_str()) {
                if values.contains_key(name) {
                    return Err(format!(
                        "{}() got multiple values for argument '{}'",
                        call.callee, name
                    ));
                }
                values.insert(name.clone(), value.clone());
            } else if accept_extra {
                extra.insert(name.clone(), value.clone());
            } else {
                return Err(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    call.callee, name
                ));
            }
        }

        Ok(Self { values, extra })
    }

    /// Argument value, treating `None` as absent
    fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| **v != Value::None)
    }

    fn required_str(&self, name: &str) -> Result<&str, String> {
        match self.get(name) {
            Some(Value::Str(s)) => Ok(s),
            Some(_) => Err(format!("argument '{}' must be a string", name)),
            None => Err(format!("missing required argument '{}'", name)),
        }
    }

    fn str_or<'b>(&'b self, name: &str, default: &'b str) -> Result<&'b str, String> {
        match self.get(name) {
            Some(Value::Str(s)) => Ok(s),
            Some(_) => Err(format!("argument '{}' must be a string", name)),
            None => Ok(default),
        }
    }

    fn opt(&self) -> Result<Option<OptLevel>, String> {
        match self.get("opt") {
            None => Ok(None),
            Some(Value::Int(level)) => OptLevel::from_level(*level)
                .map(Some)
                .ok_or_else(|| format!("invalid optimization level {}", level)),
            Some(_) => Err("argument 'opt' must be an integer".to_string()),
        }
    }
}
