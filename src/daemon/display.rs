//! Panel brightness from the sysfs backlight class

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use asus_smc_platform::{DisplayParameters, PanelBrightness, PlatformError};

const BACKLIGHT_CLASS: &str = "/sys/class/backlight";

/// Reads `brightness` and `max_brightness` of one backlight device
pub struct SysfsBacklight {
    dir: PathBuf,
}

impl SysfsBacklight {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// First device under `/sys/class/backlight`, if any
    pub fn discover() -> Option<Self> {
        Self::discover_in(Path::new(BACKLIGHT_CLASS))
    }

    fn discover_in(class: &Path) -> Option<Self> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(class)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        dirs.sort();
        dirs.into_iter().next().map(Self::new)
    }

    async fn read_value(&self, name: &str) -> Result<u32, PlatformError> {
        let path = self.dir.join(name);
        let text = tokio::fs::read_to_string(&path).await?;
        text.trim()
            .parse()
            .map_err(|e| PlatformError::Io(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl DisplayParameters for SysfsBacklight {
    async fn brightness(&self) -> Result<PanelBrightness, PlatformError> {
        Ok(PanelBrightness {
            value: self.read_value("brightness").await?,
            max: self.read_value("max_brightness").await?,
        })
    }
}

/// Stand-in when the machine has no backlight device
pub struct NoDisplay;

#[async_trait]
impl DisplayParameters for NoDisplay {
    async fn brightness(&self) -> Result<PanelBrightness, PlatformError> {
        Err(PlatformError::Unavailable("no backlight device".into()))
    }
}
