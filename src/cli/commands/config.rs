use crate::cli::parser::{Commands, ConfigEdits};
use crate::config::{ChannelKind, Config};
use crate::errors::{AppError, AppResult};
use crate::ui::messages;
use std::process::Command;

/// Handle the `config` subcommand
pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Config {
        print_config,
        edit_config,
        editor,
        edits,
    } = cmd
    {
        let path = Config::config_file();
        let mut current = cfg.clone();

        // ---- SETTERS ----
        if !edits.is_empty() {
            // start from the file, not from `cfg`, so a --db override is not persisted
            let mut stored = Config::load()?;
            apply(&mut stored, edits)?;
            let saved = stored.save()?;
            messages::success(format!("Configuration saved to {}", saved.display()));
            current = stored;
        }

        // ---- PRINT CONFIG ----
        if *print_config {
            if path.exists() {
                println!("📄 Current configuration ({}):\n", path.display());
            } else {
                println!("📄 No config file at {}, defaults in effect:\n", path.display());
            }
            println!("{}", current.to_yaml()?);
        }

        // ---- EDIT CONFIG ----
        if *edit_config {
            if !path.exists() {
                Config::load()?.save()?;
            }
            edit(&path, editor.clone())?;

            // an edit that no longer parses is reported now, not on the next run
            Config::load()?;
        }
    }

    Ok(())
}

fn apply(cfg: &mut Config, edits: &ConfigEdits) -> AppResult<()> {
    for a in &edits.client_alias {
        cfg.set_client_alias(a)?;
    }

    let aliases = [
        (ChannelKind::Gpio, &edits.gpio_alias),
        (ChannelKind::Temp, &edits.temp_alias),
        (ChannelKind::Hum, &edits.hum_alias),
    ];
    for (kind, list) in aliases {
        for a in list {
            cfg.set_channel_alias(kind, a)?;
        }
    }

    let visibility = [
        (ChannelKind::Gpio, &edits.visible_pins),
        (ChannelKind::Temp, &edits.visible_temp),
        (ChannelKind::Hum, &edits.visible_hum),
    ];
    for (kind, list) in visibility {
        for a in list {
            cfg.set_visibility(kind, a)?;
        }
    }
    Ok(())
}

fn edit(path: &std::path::Path, requested: Option<String>) -> AppResult<()> {
    let default_editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            if cfg!(target_os = "windows") {
                "notepad".to_string()
            } else {
                "nano".to_string()
            }
        });
    let editor = requested.unwrap_or_else(|| default_editor.clone());

    match Command::new(&editor).arg(path).status() {
        Ok(s) if s.success() => {
            messages::success(format!(
                "Configuration file edited successfully using '{editor}'"
            ));
            return Ok(());
        }
        Ok(_) | Err(_) if editor != default_editor => {
            messages::warning(format!(
                "Editor '{editor}' not available, falling back to '{default_editor}'"
            ));
        }
        Ok(_) | Err(_) => {
            return Err(AppError::Config(format!(
                "failed to edit {} using '{editor}'",
                path.display()
            )));
        }
    }

    match Command::new(&default_editor).arg(path).status() {
        Ok(s) if s.success() => {
            messages::success(format!(
                "Configuration file edited successfully using fallback '{default_editor}'"
            ));
            Ok(())
        }
        Ok(_) | Err(_) => Err(AppError::Config(format!(
            "failed to edit {} using fallback '{default_editor}'",
            path.display()
        ))),
    }
}
