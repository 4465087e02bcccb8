use crate::errors::{AppError, AppResult};
use crate::models::episode::EpisodeMode;
use crate::models::pin::{CHANNELS, PinIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Per-client list of visible channels. A client without an entry sees all.
pub type Visibility = BTreeMap<String, Vec<u8>>;
/// Per-client channel aliases, keyed by channel number.
pub type Aliases = BTreeMap<String, BTreeMap<u8, String>>;

/// Channel family addressed by the alias and visibility settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Gpio,
    Temp,
    Hum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
    #[serde(default = "default_offline_threshold")]
    pub offline_threshold_secs: u64,
    #[serde(default)]
    pub episode_mode: EpisodeMode,
    #[serde(default)]
    pub client_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub visible_gpio_pins: Visibility,
    #[serde(default)]
    pub gpio_aliases: Aliases,
    #[serde(default)]
    pub visible_temp_sensors: Visibility,
    #[serde(default)]
    pub temp_aliases: Aliases,
    #[serde(default)]
    pub visible_hum_sensors: Visibility,
    #[serde(default)]
    pub hum_aliases: Aliases,
}

fn default_poll_interval() -> u64 {
    10
}
fn default_retry_interval() -> u64 {
    30
}
fn default_offline_threshold() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self::with_database(Self::database_file().to_string_lossy().to_string())
    }
}

impl Config {
    pub fn with_database(database: String) -> Self {
        Self {
            database,
            poll_interval_secs: default_poll_interval(),
            retry_interval_secs: default_retry_interval(),
            offline_threshold_secs: default_offline_threshold(),
            episode_mode: EpisodeMode::default(),
            client_aliases: BTreeMap::new(),
            visible_gpio_pins: BTreeMap::new(),
            gpio_aliases: BTreeMap::new(),
            visible_temp_sensors: BTreeMap::new(),
            temp_aliases: BTreeMap::new(),
            visible_hum_sensors: BTreeMap::new(),
            hum_aliases: BTreeMap::new(),
        }
    }

    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("pinwatch")
        } else {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".pinwatch")
        }
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("pinwatch.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("pinwatch.sqlite")
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        let path = Self::config_file();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> AppResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> AppResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Initialize configuration directory and file, returning the DB path.
    pub fn init_all(custom_name: Option<String>, is_test: bool) -> AppResult<PathBuf> {
        let dir = Self::config_dir();

        // DB name: user provided or default
        let db_path = if let Some(name) = custom_name {
            let p = std::path::Path::new(&name);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                dir.join(p)
            }
        } else {
            dir.join("pinwatch.sqlite")
        };

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write config file
        if !is_test {
            let config = Self::with_database(db_path.to_string_lossy().to_string());
            let path = config.save()?;
            println!("✅ Config file: {:?}", path);
        }

        Ok(db_path)
    }

    /// Write the configuration to `config_file()`, creating the directory.
    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::config_file();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, self.to_yaml()?)
            .map_err(|e| AppError::Config(format!("cannot write {}: {e}", path.display())))?;
        Ok(path)
    }

    /// Apply `CLIENT=NAME`. An empty name removes the alias.
    pub fn set_client_alias(&mut self, assignment: &str) -> AppResult<()> {
        let (client, name) = split_assignment(assignment)?;
        if name.is_empty() {
            self.client_aliases.remove(client);
        } else {
            self.client_aliases.insert(client.to_string(), name.to_string());
        }
        Ok(())
    }

    /// Apply `CLIENT:CHANNEL=NAME`. An empty name removes the alias.
    pub fn set_channel_alias(&mut self, kind: ChannelKind, assignment: &str) -> AppResult<()> {
        let (target, name) = split_assignment(assignment)?;
        let (client, channel) = target.rsplit_once(':').ok_or_else(|| {
            AppError::Config(format!("expected CLIENT:CHANNEL=NAME, got '{assignment}'"))
        })?;
        if client.is_empty() {
            return Err(AppError::Config(format!("missing client in '{assignment}'")));
        }
        let channel = parse_channel(channel)?;

        let aliases = match kind {
            ChannelKind::Gpio => &mut self.gpio_aliases,
            ChannelKind::Temp => &mut self.temp_aliases,
            ChannelKind::Hum => &mut self.hum_aliases,
        };
        if name.is_empty() {
            if let Some(per_client) = aliases.get_mut(client) {
                per_client.remove(&channel);
                if per_client.is_empty() {
                    aliases.remove(client);
                }
            }
        } else {
            aliases
                .entry(client.to_string())
                .or_default()
                .insert(channel, name.to_string());
        }
        Ok(())
    }

    /// Apply `CLIENT=0,2,5`. `CLIENT=all` drops the entry so every channel
    /// shows again; `CLIENT=` hides them all.
    pub fn set_visibility(&mut self, kind: ChannelKind, assignment: &str) -> AppResult<()> {
        let (client, list) = split_assignment(assignment)?;
        let vis = match kind {
            ChannelKind::Gpio => &mut self.visible_gpio_pins,
            ChannelKind::Temp => &mut self.visible_temp_sensors,
            ChannelKind::Hum => &mut self.visible_hum_sensors,
        };

        if list.eq_ignore_ascii_case("all") {
            vis.remove(client);
            return Ok(());
        }

        let mut channels = list
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(parse_channel)
            .collect::<AppResult<Vec<u8>>>()?;
        channels.sort_unstable();
        channels.dedup();
        vis.insert(client.to_string(), channels);
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.max(1))
    }

    pub fn client_display_name(&self, client_id: &str) -> String {
        self.client_aliases
            .get(client_id)
            .cloned()
            .unwrap_or_else(|| client_id.to_string())
    }

    pub fn visible_pins(&self, client_id: &str) -> Vec<PinIndex> {
        match self.visible_gpio_pins.get(client_id) {
            Some(pins) => pins
                .iter()
                .filter_map(|p| PinIndex::new(*p as i64).ok())
                .collect(),
            None => PinIndex::all().collect(),
        }
    }

    pub fn gpio_alias(&self, client_id: &str, pin: PinIndex) -> String {
        alias_or(&self.gpio_aliases, client_id, pin.get(), "GPIO")
    }

    pub fn temp_alias(&self, client_id: &str, channel: u8) -> String {
        alias_or(&self.temp_aliases, client_id, channel, "Sensor")
    }

    pub fn hum_alias(&self, client_id: &str, channel: u8) -> String {
        alias_or(&self.hum_aliases, client_id, channel, "Humidity")
    }

    /// A channel shows in the sensor list when either its temperature or its
    /// humidity side is visible.
    pub fn sensor_visible(&self, client_id: &str, channel: u8) -> bool {
        is_visible(&self.visible_temp_sensors, client_id, channel)
            || is_visible(&self.visible_hum_sensors, client_id, channel)
    }
}

fn alias_or(aliases: &Aliases, client_id: &str, channel: u8, prefix: &str) -> String {
    aliases
        .get(client_id)
        .and_then(|m| m.get(&channel))
        .cloned()
        .unwrap_or_else(|| format!("{prefix} {channel}"))
}

fn split_assignment(assignment: &str) -> AppResult<(&str, &str)> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| AppError::Config(format!("expected KEY=VALUE, got '{assignment}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::Config(format!("missing client in '{assignment}'")));
    }
    Ok((key, value.trim()))
}

fn parse_channel(raw: &str) -> AppResult<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|c| (*c as usize) < CHANNELS)
        .ok_or_else(|| {
            AppError::Config(format!("channel must be 0-{}, got '{raw}'", CHANNELS - 1))
        })
}

fn is_visible(vis: &Visibility, client_id: &str, channel: u8) -> bool {
    vis.get(client_id).is_none_or(|v| v.contains(&channel))
}
