//! Build targets.
//!
//! A target is an operating system and CPU architecture pair written as
//! `os_arch` (for example `linux_amd64`). Steps that do not depend on a
//! target receive `None` in place of a `Target`.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Os {
    #[display("windows")]
    Windows,
    #[display("linux")]
    Linux,
    #[display("darwin")]
    Darwin,
    #[display("jvm")]
    Jvm,
    #[display("android")]
    Android,
}

impl Os {
    pub const ALL: [Os; 5] = [Os::Windows, Os::Linux, Os::Darwin, Os::Jvm, Os::Android];
}

impl FromStr for Os {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Os::ALL
            .into_iter()
            .find(|os| os.to_string() == s)
            .ok_or_else(|| Error::UnknownOs(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Arch {
    #[display("amd64")]
    Amd64,
    #[display("arm64")]
    Arm64,
    #[display("arm")]
    Arm,
    #[display("i386")]
    I386,
}

impl Arch {
    pub const ALL: [Arch; 4] = [Arch::Amd64, Arch::Arm64, Arch::Arm, Arch::I386];
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .into_iter()
            .find(|arch| arch.to_string() == s)
            .ok_or_else(|| Error::UnknownArch(s.to_string()))
    }
}

/// An OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target {
    pub os: Os,
    pub arch: Arch,
}

impl Target {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Artifact name for this target: `name-os_arch`, with `.exe` on Windows.
    pub fn exe_name(&self, name: &str) -> String {
        let ext = if self.is_windows() { ".exe" } else { "" };
        format!("{name}-{self}{ext}")
    }

    /// Artifact name without the target suffix: `name`, with `.exe` on Windows.
    pub fn clean_name(&self, name: &str) -> String {
        if self.is_windows() {
            format!("{name}.exe")
        } else {
            name.to_string()
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once('_')
            .ok_or_else(|| Error::InvalidTarget(s.to_string()))?;
        Ok(Self {
            os: os.parse()?,
            arch: arch.parse()?,
        })
    }
}

impl TryFrom<String> for Target {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let target: Target = "linux_amd64".parse().unwrap();
        assert_eq!(target, Target::new(Os::Linux, Arch::Amd64));
        assert_eq!(target.to_string(), "linux_amd64");

        for os in Os::ALL {
            for arch in Arch::ALL {
                let target = Target::new(os, arch);
                assert_eq!(target.to_string().parse::<Target>().unwrap(), target);
            }
        }
    }

    #[test]
    fn test_parse_errors_name_the_token() {
        let err = "plan9_amd64".parse::<Target>().unwrap_err();
        assert_eq!(err.to_string(), "unknown OS: plan9");

        let err = "linux_mips".parse::<Target>().unwrap_err();
        assert_eq!(err.to_string(), "unknown arch: mips");

        assert!(matches!(
            "linux".parse::<Target>(),
            Err(Error::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_artifact_names() {
        let windows = Target::new(Os::Windows, Arch::Amd64);
        let darwin = Target::new(Os::Darwin, Arch::Arm64);

        assert_eq!(windows.exe_name("app"), "app-windows_amd64.exe");
        assert_eq!(darwin.exe_name("app"), "app-darwin_arm64");
        assert_eq!(windows.clean_name("app"), "app.exe");
        assert_eq!(darwin.clean_name("app"), "app");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let target = Target::new(Os::Android, Arch::Arm);
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, "\"android_arm\"");
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);
        assert!(serde_json::from_str::<Target>("\"beos_amd64\"").is_err());
    }
}
