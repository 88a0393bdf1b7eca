//! `go build` flag handling
//!
//! Flags are parsed with the go command's own rules (`-f v`, `-f=v`, `--f`;
//! parsing stops at `--` or the first non-flag) so that the ones gococo
//! cares about can be inspected and path-valued ones made absolute before
//! the build moves into the shadow copy.

use crate::error::{GococoError, GococoResult};
use crate::paths;
use crate::project::ResolveOptions;
use crate::toolchain::BuildVerb;
use std::path::{Path, PathBuf};

const BOOL_FLAGS: &[&str] = &[
    "a",
    "n",
    "v",
    "x",
    "race",
    "msan",
    "asan",
    "linkshared",
    "trimpath",
    "work",
    "modcacherw",
    "cover",
];

const VALUE_FLAGS: &[&str] = &[
    "p",
    "buildmode",
    "mod",
    "installsuffix",
    "asmflags",
    "compiler",
    "gcflags",
    "gccgoflags",
    "modfile",
    "ldflags",
    "pkgdir",
    "tags",
    "toolexec",
    "overlay",
    "pgo",
    "buildvcs",
    "o",
];

/// Value flags naming a path relative to the working directory
const PATH_FLAGS: &[&str] = &["o", "modfile", "overlay", "pkgdir"];

/// Parsed build arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoFlags {
    /// Flags to forward, normalized to `-name` / `-name=bool` / `-name value`
    pub flags: Vec<String>,
    /// Package arguments
    pub packages: Vec<String>,
    /// Absolute `-o` target
    pub output: Option<PathBuf>,
    pub tags: Option<String>,
    /// Value of `-mod`
    pub build_mod: Option<String>,
}

impl GoFlags {
    /// Parse the arguments given after `gococo build` / `gococo install`
    pub fn parse(args: &[String], cwd: &Path, verb: BuildVerb) -> GococoResult<Self> {
        let mut parsed = Self::default();
        let mut rest = args.iter();

        while let Some(arg) = rest.next() {
            if arg == "--" {
                parsed.packages.extend(rest.by_ref().cloned());
                break;
            }
            let Some(body) = flag_body(arg) else {
                parsed.packages.push(arg.clone());
                parsed.packages.extend(rest.by_ref().cloned());
                break;
            };

            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (body, None),
            };

            if BOOL_FLAGS.contains(&name) {
                match inline {
                    None => parsed.flags.push(format!("-{}", name)),
                    Some(value) => {
                        parse_bool(&value).ok_or_else(|| {
                            GococoError::InvalidArgs(format!(
                                "invalid boolean value {:?} for -{}",
                                value, name
                            ))
                        })?;
                        parsed.flags.push(format!("-{}={}", name, value));
                    }
                }
            } else if VALUE_FLAGS.contains(&name) {
                let value = match inline {
                    Some(value) => value,
                    None => rest.next().cloned().ok_or_else(|| {
                        GococoError::InvalidArgs(format!("flag needs an argument: -{}", name))
                    })?,
                };
                parsed.set_value(name, value, cwd);
            } else {
                return Err(GococoError::InvalidArgs(format!(
                    "flag provided but not defined: -{}",
                    name
                )));
            }
        }

        if verb == BuildVerb::Build && parsed.output.is_none() {
            let output = paths::normalize(cwd);
            parsed.flags.push("-o".to_string());
            parsed.flags.push(output.to_string_lossy().into_owned());
            parsed.output = Some(output);
        }

        Ok(parsed)
    }

    fn set_value(&mut self, name: &str, value: String, cwd: &Path) {
        let value = if PATH_FLAGS.contains(&name) && !value.is_empty() {
            paths::absolutize(cwd, Path::new(&value))
                .to_string_lossy()
                .into_owned()
        } else {
            value
        };

        match name {
            "o" => self.output = Some(PathBuf::from(&value)),
            "tags" => self.tags = Some(value.clone()),
            "mod" => self.build_mod = Some(value.clone()),
            _ => {}
        }

        self.flags.push(format!("-{}", name));
        self.flags.push(value);
    }

    /// Options that change what the package lister reports
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            build_tags: self.tags.clone(),
            build_mod: self.build_mod.clone(),
        }
    }

    /// Arguments for the delegated build: flags, then packages
    pub fn build_args(&self) -> Vec<String> {
        self.flags
            .iter()
            .chain(self.packages.iter())
            .cloned()
            .collect()
    }
}

/// Name (and inline value) of a flag argument, `None` for a non-flag
fn flag_body(arg: &str) -> Option<&str> {
    let body = arg
        .strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))?;
    if body.is_empty() {
        // A lone "-" is a package argument
        return None;
    }
    Some(body)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn parse(list: &[&str], verb: BuildVerb) -> GococoResult<GoFlags> {
        GoFlags::parse(&args(list), Path::new("/work/app"), verb)
    }

    #[test]
    fn build_defaults_output_to_cwd() {
        let flags = parse(&[], BuildVerb::Build).unwrap();
        assert_eq!(flags.output, Some(PathBuf::from("/work/app")));
        assert_eq!(flags.build_args(), args(&["-o", "/work/app"]));
    }

    #[test]
    fn install_has_no_default_output() {
        let flags = parse(&["./cmd/..."], BuildVerb::Install).unwrap();
        assert_eq!(flags.output, None);
        assert_eq!(flags.build_args(), args(&["./cmd/..."]));
    }

    #[test]
    fn value_flag_spellings() {
        let flags = parse(
            &["-tags", "integration", "--ldflags=-s -w", "-mod=vendor", "-race", "./..."],
            BuildVerb::Install,
        )
        .unwrap();

        assert_eq!(flags.tags.as_deref(), Some("integration"));
        assert_eq!(flags.build_mod.as_deref(), Some("vendor"));
        assert_eq!(
            flags.build_args(),
            args(&["-tags", "integration", "-ldflags", "-s -w", "-mod", "vendor", "-race", "./..."])
        );

        let options = flags.resolve_options();
        assert_eq!(options.build_tags.as_deref(), Some("integration"));
        assert_eq!(options.build_mod.as_deref(), Some("vendor"));
    }

    #[test]
    fn output_is_made_absolute() {
        let flags = parse(&["-o", "../bin/app", "."], BuildVerb::Build).unwrap();
        assert_eq!(flags.output, Some(PathBuf::from("/work/bin/app")));
        assert_eq!(flags.build_args(), args(&["-o", "/work/bin/app", "."]));
    }

    #[test]
    fn parsing_stops_at_first_package() {
        let flags = parse(&["-v", "./cmd/a", "-race"], BuildVerb::Install).unwrap();
        assert_eq!(flags.flags, args(&["-v"]));
        assert_eq!(flags.packages, args(&["./cmd/a", "-race"]));
    }

    #[test]
    fn double_dash_ends_flags() {
        let flags = parse(&["-a", "--", "-weird"], BuildVerb::Install).unwrap();
        assert_eq!(flags.packages, args(&["-weird"]));
    }

    #[test]
    fn bool_flag_with_value() {
        let flags = parse(&["-trimpath=false"], BuildVerb::Install).unwrap();
        assert_eq!(flags.flags, args(&["-trimpath=false"]));
        assert!(parse(&["-trimpath=maybe"], BuildVerb::Install).is_err());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = parse(&["-frobnicate"], BuildVerb::Build).unwrap_err();
        assert!(matches!(err, GococoError::InvalidArgs(ref msg) if msg.contains("-frobnicate")));
    }

    #[test]
    fn missing_value_is_rejected() {
        let err = parse(&["-ldflags"], BuildVerb::Build).unwrap_err();
        assert!(matches!(err, GococoError::InvalidArgs(ref msg) if msg.contains("needs an argument")));
    }
}
