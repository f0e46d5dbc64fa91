//! Configuration de PMOSsdp
//!
//! La configuration est un arbre YAML construit en trois couches :
//!
//! 1. les valeurs par défaut embarquées (`pmossdp.yaml`) ;
//! 2. le fichier `config.yaml` du répertoire de configuration ;
//! 3. les variables d'environnement `PMOSSDP_CONFIG__A__B=valeur`.
//!
//! Les clés sont insensibles à la casse. Toute modification passe par
//! [`Config::set_value`] et est immédiatement écrite sur disque.
//!
//! Il n'y a pas de singleton : le démon charge une [`Config`] et passe aux
//! composants les valeurs dont ils ont besoin.
//!
//! ```no_run
//! use pmoconfig::Config;
//!
//! let config = Config::load_config("")?;
//! let port = config.get_http_port();
//! config.set_http_port(port + 1)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};
use uuid::Uuid;

const EMBEDDED_DEFAULTS: &str = include_str!("pmossdp.yaml");

const CONFIG_FILE: &str = "config.yaml";
const CONFIG_DIR_NAME: &str = ".pmossdp";
const ENV_CONFIG_DIR: &str = "PMOSSDP_CONFIG";
const ENV_OVERRIDE_PREFIX: &str = "PMOSSDP_CONFIG__";

const HTTP_PORT: &[&str] = &["host", "http_port"];
const LOG_MIN_LEVEL: &[&str] = &["host", "logger", "min_level"];
const LOG_ENABLE_CONSOLE: &[&str] = &["host", "logger", "enable_console"];

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

/// Configuration chargée depuis un répertoire.
#[derive(Debug)]
pub struct Config {
    directory: PathBuf,
    file: PathBuf,
    tree: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            file: self.file.clone(),
            tree: Mutex::new(self.tree().clone()),
        }
    }
}

impl Config {
    /// Répertoire de configuration à utiliser, créé au besoin.
    ///
    /// Par ordre de priorité : `directory` s'il n'est pas vide, la variable
    /// `PMOSSDP_CONFIG`, `.pmossdp` dans le répertoire courant puis dans le
    /// répertoire personnel. À défaut, `.pmossdp` est créé dans le répertoire
    /// courant. Le répertoire doit être accessible en écriture.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = locate_config_dir(directory);
        ensure_writable_dir(&dir)?;
        Ok(dir.to_string_lossy().into_owned())
    }

    /// Charge la configuration du répertoire `directory` (vide : recherche
    /// par défaut, voir [`Config::config_dir`]) et l'enregistre fusionnée.
    pub fn load_config(directory: &str) -> Result<Self> {
        let directory = PathBuf::from(Self::config_dir(directory)?);
        let file = directory.join(CONFIG_FILE);
        info!(config_dir = %directory.display(), "📁 Using config directory");

        let mut tree: Value =
            serde_yaml::from_str(EMBEDDED_DEFAULTS).context("embedded configuration")?;
        match fs::read_to_string(&file) {
            Ok(text) => {
                let user: Value = serde_yaml::from_str(&text)
                    .with_context(|| format!("invalid YAML in {}", file.display()))?;
                overlay(&mut tree, user);
                info!(config_file = %file.display(), "✅ Config file loaded");
            }
            Err(_) => info!(config_file = %file.display(), "No config file, using defaults"),
        }

        let mut tree = lowercase_keys(tree);
        for (path, value) in env_overrides(env::vars()) {
            let path: Vec<&str> = path.iter().map(String::as_str).collect();
            if let Err(e) = insert_at(&mut tree, &path, value) {
                warn!("Ignoring environment override {}: {}", path.join("."), e);
            }
        }

        let config = Self {
            directory,
            file,
            tree: Mutex::new(tree),
        };
        config.save()?;
        Ok(config)
    }

    fn tree(&self) -> MutexGuard<'_, Value> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Répertoire contenant `config.yaml`
    pub fn directory(&self) -> &str {
        self.directory.to_str().unwrap_or_default()
    }

    /// Écrit la configuration courante dans `config.yaml`.
    pub fn save(&self) -> Result<()> {
        let text = serde_yaml::to_string(&*self.tree())?;
        fs::write(&self.file, text)
            .with_context(|| format!("cannot write {}", self.file.display()))
    }

    /// Remplace la valeur au chemin `path` (créé au besoin) et enregistre.
    ///
    /// ```no_run
    /// # use pmoconfig::Config;
    /// # use serde_yaml::Value;
    /// # let config = Config::load_config("")?;
    /// config.set_value(&["host", "logger", "min_level"], Value::from("DEBUG"))?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        insert_at(&mut self.tree(), path, value)?;
        self.save()
    }

    /// Valeur au chemin `path`, erreur si le chemin n'existe pas.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        lookup(&self.tree(), path).cloned()
    }

    /// Valeur typée au chemin `path`, `None` si absente ou mal typée.
    pub fn get_as<T: DeserializeOwned>(&self, path: &[&str]) -> Option<T> {
        let value = self.get_value(path).ok()?;
        match serde_yaml::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Invalid value at {}: {}", path.join("."), e);
                None
            }
        }
    }

    /// Port du serveur de descriptions (utilisé dans `LOCATION`).
    pub fn get_http_port(&self) -> u16 {
        self.get_as(HTTP_PORT).unwrap_or(DEFAULT_HTTP_PORT)
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(HTTP_PORT, Value::from(port))
    }

    /// UUID persistant d'un device, généré au premier appel.
    ///
    /// Retourne l'UUID nu, sans préfixe `uuid:`.
    pub fn get_device_udn(&self, devtype: &str, name: &str) -> Result<String> {
        let path = ["devices", devtype, name, "udn"];
        if let Some(udn) = self.get_as::<String>(&path) {
            let udn = bare_udn(&udn);
            if !udn.is_empty() {
                return Ok(udn.to_string());
            }
        }

        let udn = Uuid::new_v4().to_string();
        info!(devtype, name, udn = %udn, "🆔 New device UDN");
        self.set_value(&path, Value::from(udn.as_str()))?;
        Ok(udn)
    }

    pub fn set_device_udn(&self, devtype: &str, name: &str, udn: String) -> Result<()> {
        self.set_value(
            &["devices", devtype, name, "udn"],
            Value::from(bare_udn(&udn)),
        )
    }

    /// Niveau minimal des logs (`ERROR`, `WARN`, `INFO`, `DEBUG`, `TRACE`).
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self
            .get_as(LOG_MIN_LEVEL)
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string()))
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(LOG_MIN_LEVEL, Value::String(level))
    }

    /// Sortie des logs sur la console, active par défaut.
    pub fn get_log_enable_console(&self) -> Result<bool> {
        Ok(self.get_as(LOG_ENABLE_CONSOLE).unwrap_or(true))
    }

    pub fn set_log_enable_console(&self, enabled: bool) -> Result<()> {
        self.set_value(LOG_ENABLE_CONSOLE, Value::Bool(enabled))
    }
}

fn bare_udn(udn: &str) -> &str {
    let udn = udn.trim();
    udn.strip_prefix("uuid:").unwrap_or(udn)
}

fn locate_config_dir(directory: &str) -> PathBuf {
    if !directory.is_empty() {
        return PathBuf::from(directory);
    }
    if let Ok(dir) = env::var(ENV_CONFIG_DIR) {
        info!(env_var = ENV_CONFIG_DIR, path = %dir, "Config directory from environment");
        return PathBuf::from(dir);
    }

    let local = PathBuf::from(CONFIG_DIR_NAME);
    if local.is_dir() {
        return local;
    }
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .filter(|dir| dir.is_dir())
        .unwrap_or(local)
}

fn ensure_writable_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let marker = dir.join(".write_test");
    fs::write(&marker, b"")
        .and_then(|_| fs::remove_file(&marker))
        .with_context(|| format!("{} is not writable", dir.display()))
}

/// Superpose `upper` sur `base` : les mappings sont fusionnés clé par clé,
/// toute autre valeur (scalaire, séquence) remplace celle de `base`.
fn overlay(base: &mut Value, upper: Value) {
    match (base, upper) {
        (Value::Mapping(base), Value::Mapping(upper)) => {
            for (key, value) in upper {
                match base.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, upper) => *base = upper,
    }
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (key, lowercase_keys(value))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Chemins et valeurs des variables `PMOSSDP_CONFIG__A__B=valeur`.
///
/// La valeur est interprétée comme du YAML (`42`, `true`, `[a, b]`), sinon
/// gardée comme chaîne.
fn env_overrides<I>(vars: I) -> Vec<(Vec<String>, Value)>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, raw)| {
            let path = key.strip_prefix(ENV_OVERRIDE_PREFIX)?;
            let path: Vec<String> = path.split("__").map(str::to_lowercase).collect();
            let value = serde_yaml::from_str(&raw).unwrap_or(Value::String(raw));
            Some((path, value))
        })
        .collect()
}

fn lookup<'a>(tree: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter().enumerate().try_fold(tree, |node, (depth, key)| {
        let Value::Mapping(map) = node else {
            bail!("{} is not a mapping", path[..depth].join("."));
        };
        map.get(key.to_lowercase().as_str())
            .with_context(|| format!("no configuration value at {}", path[..=depth].join(".")))
    })
}

fn insert_at(tree: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *tree = value;
        return Ok(());
    };

    let mut node = tree;
    for key in parents {
        let Value::Mapping(map) = node else {
            bail!("cannot descend into a scalar at '{}'", key);
        };
        node = map
            .entry(Value::String(key.to_lowercase()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
    let Value::Mapping(map) = node else {
        bail!("cannot set '{}' inside a scalar", last);
    };
    map.insert(Value::String(last.to_lowercase()), value);
    Ok(())
}
