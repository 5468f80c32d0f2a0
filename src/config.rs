use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

#[derive(Parser, Debug, Clone)]
#[command(name = "sodabottle")]
#[command(about = "Hover, click or hold Space to fill the bottle. Let go and it empties.", long_about = None)]
pub(crate) struct Args {
    /// FPS cap (render rate). Timers run on their own clock.
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// RNG seed for bubbles (defaults to the clock)
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Theme: cola, lime, orange, grape, mono
    #[arg(long)]
    pub(crate) theme: Option<String>,

    /// Hide the HUD
    #[arg(long, default_value_t = false)]
    pub(crate) no_hud: bool,

    /// Plain 16-color output
    #[arg(long, default_value_t = false)]
    pub(crate) no_color: bool,

    /// Release a held key after this many ms without a repeat, when the terminal can't report releases
    #[arg(long)]
    pub(crate) key_release_ms: Option<u64>,

    /// Append tracing output to this file
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub(crate) log_level: String,

    /// Settings file (JSON). Defaults to settings.json in the platform config dir
    #[arg(long)]
    pub(crate) settings: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) theme: String,
    pub(crate) show_hud: bool,
    pub(crate) enable_color: bool,
    pub(crate) key_release_ms: u64,
    pub(crate) seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 60,
            theme: "cola".to_string(),
            show_hud: true,
            enable_color: true,
            key_release_ms: 600,
            seed: None,
        }
    }
}

impl Settings {
    /// CLI flags win over whatever the file said.
    pub(crate) fn merge_args(mut self, args: &Args) -> Self {
        if let Some(fps) = args.fps {
            self.fps_cap = fps;
        }
        if let Some(theme) = &args.theme {
            self.theme = theme.clone();
        }
        if args.no_hud {
            self.show_hud = false;
        }
        if args.no_color {
            self.enable_color = false;
        }
        if let Some(ms) = args.key_release_ms {
            self.key_release_ms = ms;
        }
        if args.seed.is_some() {
            self.seed = args.seed;
        }
        self.fps_cap = self.fps_cap.clamp(10, 240);
        self.key_release_ms = self.key_release_ms.max(50);
        self
    }
}

pub(crate) fn default_settings_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("com", "sodabottle", "Sodabottle")
        .context("could not resolve project directories")?;
    Ok(proj.config_dir().join("settings.json"))
}

/// Best effort: a missing file is silent, a broken one is logged and ignored.
pub(crate) fn load_settings(path: &Path) -> Settings {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Settings::default(),
    };
    match serde_json::from_str::<Settings>(&raw) {
        Ok(s) => s,
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring unreadable settings");
            Settings::default()
        }
    }
}

pub(crate) fn resolve(args: &Args) -> Settings {
    let path = match &args.settings {
        Some(p) => Some(p.clone()),
        None => default_settings_path().ok(),
    };
    let file = path.as_deref().map(load_settings).unwrap_or_default();
    file.merge_args(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sodabottle-{}-{}", std::process::id(), name));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = tmp_file("partial.json", r#"{ "theme": "lime", "fps_cap": 30 }"#);
        let s = load_settings(&path);
        fs::remove_file(&path).ok();
        assert_eq!(s.theme, "lime");
        assert_eq!(s.fps_cap, 30);
        assert!(s.show_hud);
        assert_eq!(s.key_release_ms, 600);
    }

    #[test]
    fn broken_or_missing_file_falls_back() {
        let path = tmp_file("broken.json", "{ not json");
        assert_eq!(load_settings(&path), Settings::default());
        fs::remove_file(&path).ok();
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn cli_overrides_file() {
        let path = tmp_file("merge.json", r#"{ "theme": "lime", "seed": 5, "show_hud": true }"#);
        let args = Args::parse_from([
            "sodabottle",
            "--settings",
            path.to_str().unwrap(),
            "--theme",
            "grape",
            "--no-hud",
            "--fps",
            "1000",
        ]);
        let s = resolve(&args);
        fs::remove_file(&path).ok();

        assert_eq!(s.theme, "grape");
        assert!(!s.show_hud);
        assert_eq!(s.seed, Some(5));
        assert_eq!(s.fps_cap, 240);
    }

    #[test]
    fn key_release_has_a_floor() {
        let args = Args::parse_from(["sodabottle", "--key-release-ms", "3"]);
        assert_eq!(Settings::default().merge_args(&args).key_release_ms, 50);
    }
}
