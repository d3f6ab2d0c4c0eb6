//! Preset directory management
//!
//! Presets are stored as `<dir>/<name>.txt`. The active preset is recorded in
//! a side-car `active_preset.ini` and mirrored into a fixed-path file that
//! `winws.exe` reads through `@file`.

use super::Preset;
use crate::error::{Error, Result};
use crate::util::write_atomic;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the side-car pointer file inside the presets directory
pub const POINTER_FILE: &str = "active_preset.ini";

const PRESET_EXTENSION: &str = "txt";
const MAX_NAME_LEN: usize = 64;
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Summary of a stored preset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetEntry {
    /// Preset name (file stem)
    pub name: String,
    /// Preset file path
    pub path: PathBuf,
    /// `Description` header
    pub description: Option<String>,
    /// `Modified` header
    pub modified: Option<String>,
    /// Whether this is the active preset
    pub active: bool,
}

/// Check that a preset name can be used as a file stem
pub fn validate_name(name: &str) -> Result<()> {
    let reject = |reason| {
        Err(Error::InvalidPresetName {
            name: name.to_string(),
            reason,
        })
    };

    if name.trim().is_empty() {
        return reject("name is empty");
    }
    if name != name.trim() {
        return reject("name has leading or trailing whitespace");
    }
    if name == "." || name == ".." {
        return reject("reserved name");
    }
    if name.chars().count() > MAX_NAME_LEN {
        return reject("name is longer than 64 characters");
    }
    if name.chars().any(|c| FORBIDDEN_CHARS.contains(&c) || c.is_control()) {
        return reject("name contains a character not allowed in file names");
    }
    Ok(())
}

/// Directory of preset files plus the active pointer and mirror
#[derive(Debug, Clone)]
pub struct PresetStore {
    dir: PathBuf,
    mirror: PathBuf,
}

impl PresetStore {
    /// Create a store over `dir`, mirroring the active preset into `mirror`
    pub fn new(dir: impl Into<PathBuf>, mirror: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mirror: mirror.into(),
        }
    }

    /// Presets directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Active preset mirror path
    pub fn mirror_path(&self) -> &Path {
        &self.mirror
    }

    /// Path of the side-car pointer file
    pub fn pointer_path(&self) -> PathBuf {
        self.dir.join(POINTER_FILE)
    }

    /// Path of a preset file; names that could escape the directory are rejected
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{PRESET_EXTENSION}")))
    }

    /// Whether a preset exists
    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_ok_and(|path| path.is_file())
    }

    /// List stored presets, sorted case-insensitively by name
    pub fn list(&self) -> Result<Vec<PresetEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let active = self.active_name()?;
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PRESET_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let (description, modified) = match fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|text| Preset::parse(&text))
            {
                Ok(preset) => (preset.header.description, preset.header.modified),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable preset");
                    continue;
                }
            };

            entries.push(PresetEntry {
                active: active.as_deref() == Some(name.as_str()),
                name,
                path,
                description,
                modified,
            });
        }

        entries.sort_by_key(|e| e.name.to_lowercase());
        Ok(entries)
    }

    /// Load a preset by name
    ///
    /// The file stem wins over the `# Preset:` header so that saving writes
    /// back to the same file.
    pub fn load(&self, name: &str) -> Result<Preset> {
        let path = self.path_of(name)?;
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::PresetNotFound {
                name: name.to_string(),
            },
            _ => Error::Io(e),
        })?;

        let mut preset = Preset::parse(&text)?;
        if preset.header.name != name {
            if !preset.header.name.is_empty() {
                debug!(preset = %name, header = %preset.header.name, "Header name differs from file name");
            }
            preset.header.name = name.to_string();
        }
        // ActivePreset only belongs in the mirror
        preset.header.active_preset = None;
        Ok(preset)
    }

    /// Save a preset under its header name, stamping timestamps
    pub fn save(&self, preset: &mut Preset) -> Result<PathBuf> {
        let name = preset.header.name.clone();
        let path = self.path_of(&name)?;
        preset.header.active_preset = None;
        preset.header.touch();

        fs::create_dir_all(&self.dir)?;
        write_atomic(&path, &preset.render())?;
        debug!(preset = %name, path = %path.display(), "Saved preset");

        if self.active_name()?.as_deref() == Some(name.as_str()) {
            self.write_mirror(preset)?;
        }
        Ok(path)
    }

    /// Create a new preset, failing if the name is taken
    pub fn create(&self, mut preset: Preset) -> Result<Preset> {
        validate_name(preset.name())?;
        if self.exists(preset.name()) {
            return Err(Error::PresetExists {
                name: preset.header.name.clone(),
            });
        }
        preset.header.created = None;
        self.save(&mut preset)?;
        info!(preset = %preset.name(), "Created preset");
        Ok(preset)
    }

    /// Delete a preset; deleting the active one clears the pointer and mirror
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        if !path.is_file() {
            return Err(Error::PresetNotFound {
                name: name.to_string(),
            });
        }
        fs::remove_file(&path)?;

        if self.active_name()?.as_deref() == Some(name) {
            self.clear_active()?;
        }
        info!(preset = %name, "Deleted preset");
        Ok(())
    }

    /// Rename a preset, following the active pointer
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        validate_name(from)?;
        validate_name(to)?;
        if self.exists(to) {
            return Err(Error::PresetExists { name: to.to_string() });
        }

        let mut preset = self.load(from)?;
        preset.header.name = to.to_string();
        let was_active = self.active_name()?.as_deref() == Some(from);

        self.save(&mut preset)?;
        fs::remove_file(self.path_of(from)?)?;

        if was_active {
            self.activate(to)?;
        }
        info!(from = %from, to = %to, "Renamed preset");
        Ok(())
    }

    /// Copy a preset under a new name
    pub fn duplicate(&self, from: &str, to: &str) -> Result<Preset> {
        let mut preset = self.load(from)?;
        preset.header.name = to.to_string();
        self.create(preset)
    }

    /// Make a preset active: write the pointer and refresh the mirror
    pub fn activate(&self, name: &str) -> Result<()> {
        let preset = self.load(name)?;
        fs::create_dir_all(&self.dir)?;
        write_atomic(&self.pointer_path(), &format!("[Preset]\nActive={name}\n"))?;
        self.write_mirror(&preset)?;
        info!(preset = %name, mirror = %self.mirror.display(), "Activated preset");
        Ok(())
    }

    /// Name recorded in the pointer file
    pub fn active_name(&self) -> Result<Option<String>> {
        let path = self.pointer_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(text.lines().find_map(|line| {
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            (key.trim().eq_ignore_ascii_case("active") && !value.is_empty())
                .then(|| value.to_string())
        }))
    }

    /// Load the active preset, if any
    pub fn active(&self) -> Result<Option<Preset>> {
        match self.active_name()? {
            Some(name) => self.load(&name).map(Some),
            None => Ok(None),
        }
    }

    /// Forget the active preset and remove the mirror
    pub fn clear_active(&self) -> Result<()> {
        for path in [self.pointer_path(), self.mirror.clone()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Replace the strategy of a category inside a stored preset
    pub fn apply_strategy(
        &self,
        name: &str,
        category: &str,
        protocol: Option<super::Protocol>,
        args: &[String],
    ) -> Result<usize> {
        let mut preset = self.load(name)?;
        let changed = preset.apply_strategy(category, protocol, args)?;
        self.save(&mut preset)?;
        info!(preset = %name, category = %category, blocks = changed, "Applied strategy");
        Ok(changed)
    }

    /// Import a preset file; the name comes from its header or file stem
    pub fn import(&self, source: &Path) -> Result<Preset> {
        let text = fs::read_to_string(source)?;
        let mut preset = Preset::parse(&text)?;
        if preset.header.name.is_empty() {
            preset.header.name = source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
        }
        preset.header.active_preset = None;
        self.create(preset)
    }

    /// Export a preset to an arbitrary path
    pub fn export(&self, name: &str, dest: &Path) -> Result<()> {
        let preset = self.load(name)?;
        fs::write(dest, preset.render())?;
        Ok(())
    }

    fn write_mirror(&self, preset: &Preset) -> Result<()> {
        let mut mirrored = preset.clone();
        mirrored.header.active_preset = Some(preset.header.name.clone());
        if let Some(parent) = self.mirror.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_atomic(&self.mirror, &mirrored.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{CategoryBlock, Protocol};

    fn store() -> (tempfile::TempDir, PresetStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path().join("presets"), dir.path().join("preset-active.txt"));
        (dir, store)
    }

    fn sample(name: &str) -> Preset {
        let mut preset = Preset::new(name);
        preset.base_args.push("--wf-tcp=443".into());
        let mut block = CategoryBlock::new(Protocol::Tcp, "443", "lists/youtube.txt");
        block.set_strategy(["--dpi-desync=fake"]);
        preset.blocks.push(block);
        preset
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("My preset").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("what?").is_err());
        assert!(validate_name(" padded").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_create_and_list() {
        let (_dir, store) = store();
        store.create(sample("Beta")).unwrap();
        store.create(sample("alpha")).unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["alpha", "Beta"]);

        assert!(matches!(store.create(sample("alpha")), Err(Error::PresetExists { .. })));
        let loaded = store.load("alpha").unwrap();
        assert!(loaded.header.created.is_some());
        assert_eq!(loaded.blocks[0].category, "youtube");
    }

    #[test]
    fn test_activate_writes_pointer_and_mirror() {
        let (_dir, store) = store();
        store.create(sample("Main")).unwrap();
        store.activate("Main").unwrap();

        assert_eq!(store.active_name().unwrap().as_deref(), Some("Main"));
        let mirror = fs::read_to_string(store.mirror_path()).unwrap();
        assert!(mirror.contains("# ActivePreset: Main"));

        // ActivePreset never leaks back into the stored preset
        assert!(store.load("Main").unwrap().header.active_preset.is_none());
        assert!(store.list().unwrap()[0].active);
    }

    #[test]
    fn test_apply_strategy_refreshes_mirror() {
        let (_dir, store) = store();
        store.create(sample("Main")).unwrap();
        store.activate("Main").unwrap();

        store
            .apply_strategy("Main", "youtube", None, &["--dpi-desync=multisplit".to_string()])
            .unwrap();

        let mirror = Preset::parse(&fs::read_to_string(store.mirror_path()).unwrap()).unwrap();
        assert_eq!(mirror.blocks[0].strategy_args, vec!["--dpi-desync=multisplit"]);
    }

    #[test]
    fn test_delete_active_clears_pointer() {
        let (_dir, store) = store();
        store.create(sample("Main")).unwrap();
        store.activate("Main").unwrap();
        store.delete("Main").unwrap();

        assert!(store.active_name().unwrap().is_none());
        assert!(!store.mirror_path().exists());
        assert!(matches!(store.delete("Main"), Err(Error::PresetNotFound { .. })));
    }

    #[test]
    fn test_rename_follows_active() {
        let (_dir, store) = store();
        store.create(sample("Old")).unwrap();
        store.activate("Old").unwrap();
        store.rename("Old", "New").unwrap();

        assert!(!store.exists("Old"));
        assert_eq!(store.active_name().unwrap().as_deref(), Some("New"));
        assert_eq!(store.load("New").unwrap().name(), "New");
    }

    #[test]
    fn test_duplicate_import_export() {
        let (dir, store) = store();
        store.create(sample("Main")).unwrap();
        let copy = store.duplicate("Main", "Copy").unwrap();
        assert_eq!(copy.blocks, store.load("Main").unwrap().blocks);

        let exported = dir.path().join("shared.txt");
        store.export("Main", &exported).unwrap();
        store.delete("Main").unwrap();
        let imported = store.import(&exported).unwrap();
        assert_eq!(imported.name(), "Main");
        assert!(store.exists("Main"));
    }
}
