// Host-side manual update flow: opens the update page or pokes the host updater

use std::process::Command;

use minorgate_shared::{GateConfig, ManualUpdate};

pub struct HostUpdater {
    manual_update_url: Option<String>,
    background_check_command: Vec<String>,
}

impl HostUpdater {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            manual_update_url: config
                .manual_update_url
                .clone()
                .filter(|u| !u.trim().is_empty()),
            background_check_command: config.background_check_command.clone(),
        }
    }
}

impl ManualUpdate for HostUpdater {
    fn has_update_ui(&self) -> bool {
        self.manual_update_url.is_some()
    }

    fn open_update_ui(&self, window_features: &str) {
        let Some(url) = &self.manual_update_url else {
            return;
        };
        tracing::info!("Opening manual update page {} ({})", url, window_features);
        if let Err(e) = open_url(url) {
            tracing::error!("Failed to open {}: {}", url, e);
        }
    }

    fn check_in_background(&self) {
        let Some((program, args)) = self.background_check_command.split_first() else {
            tracing::warn!("No background check command configured, nothing to trigger");
            return;
        };
        match Command::new(program).args(args).spawn() {
            Ok(child) => tracing::info!("Started host update check (pid {})", child.id()),
            Err(e) => tracing::error!("Failed to start {}: {}", program, e),
        }
    }
}

/// Open a URL in the default browser (Win32 ShellExecuteW)
#[cfg(target_os = "windows")]
pub fn open_url(url: &str) -> std::io::Result<()> {
    use windows::core::PCWSTR;
    use windows::Win32::UI::Shell::ShellExecuteW;
    use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    let url_wide: Vec<u16> = url.encode_utf16().chain(std::iter::once(0)).collect();
    let verb: Vec<u16> = "open\0".encode_utf16().collect();
    let result = unsafe {
        ShellExecuteW(
            None,
            PCWSTR(verb.as_ptr()),
            PCWSTR(url_wide.as_ptr()),
            None,
            None,
            SW_SHOWNORMAL,
        )
    };
    // Values above 32 mean success.
    if result.0 as isize > 32 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Open a URL in the default browser
#[cfg(not(target_os = "windows"))]
pub fn open_url(url: &str) -> std::io::Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    Command::new(opener).arg(url).spawn().map(|_| ())
}
