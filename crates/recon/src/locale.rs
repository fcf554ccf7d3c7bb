//! Locale canonicalization against a language-pack registry.
//!
//! A locale is only usable when a pack for it is known; `de_AT` falls back
//! to the language's native region (`de_DE`) when that pack exists. Pack
//! download/deploy side effects live behind [`PackageInstaller`].

use regex::Regex;

use crate::backend::{LocaleResolver, Logger, PackageInstaller};
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::model::Row;

/// `user/repo/branch` source of a language pack archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSource {
    pub user: String,
    pub repo: String,
    pub branch: String,
}

impl PackSource {
    pub fn parse(value: &str) -> Option<PackSource> {
        let mut parts = value.splitn(3, '/');
        let user = parts.next()?.to_string();
        let repo = parts.next()?.to_string();
        let branch = parts.next()?.to_string();
        if user.is_empty() || repo.is_empty() || branch.is_empty() {
            return None;
        }
        Some(PackSource { user, repo, branch })
    }

    pub fn archive_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/archive/{}.tar.gz",
            self.user, self.repo, self.branch
        )
    }
}

/// Resolver backed by the configured pack registry and an installer.
pub struct PackLocaleResolver<P: PackageInstaller> {
    packs: Vec<(String, PackSource)>,
    installer: P,
    code_shape: Regex,
}

impl<P: PackageInstaller> PackLocaleResolver<P> {
    pub fn new(config: &ImportConfig, installer: P, log: &dyn Logger) -> Self {
        let mut packs = Vec::new();
        for (code, source) in &config.language_packs {
            match PackSource::parse(source) {
                Some(pack) => packs.push((code.clone(), pack)),
                None => log.error(&format!(
                    "Invalid language pack source '{source}' for locale {code}"
                )),
            }
        }
        Self {
            packs,
            installer,
            code_shape: Regex::new("^[a-z]{2}_[A-Z]{2}$").unwrap(),
        }
    }

    fn pack_for(&self, code: &str) -> Option<&PackSource> {
        self.packs
            .iter()
            .find(|(pack_code, _)| pack_code == code)
            .map(|(_, pack)| pack)
    }
}

/// `de_AT` → `de_DE`: the language doubled as its region.
fn native_code(code: &str) -> String {
    format!("{}{}", &code[..3], code[..2].to_uppercase())
}

impl<P: PackageInstaller> LocaleResolver for PackLocaleResolver<P> {
    fn resolve(&mut self, code: &str, log: &dyn Logger) -> Option<String> {
        if !self.code_shape.is_match(code) {
            log.error(&format!("Invalid locale code {code}"));
            return None;
        }

        let canonical = if self.pack_for(code).is_some() {
            code.to_string()
        } else {
            let native = native_code(code);
            if native != code && self.pack_for(&native).is_some() {
                log.info(&format!(
                    "No language pack found for {code} but for {native} - using that"
                ));
                native
            } else {
                log.warning(&format!("Unknown language pack for locale {code}"));
                return None;
            }
        };

        let pack = self.pack_for(&canonical).unwrap().clone();
        if !self.installer.is_installed(&pack.repo) {
            log.info(&format!("Installing {}", pack.archive_url()));
            if let Err(e) = self.installer.install(&pack) {
                log.error(&format!("Could not deploy {}: {e}", pack.repo));
                return None;
            }
        }

        Some(canonical)
    }
}

#[derive(Debug, Default)]
pub struct LocaleOutcome {
    pub resolved: usize,
    pub rejected_rows: usize,
}

pub fn run_locales<R: LocaleResolver>(
    rows: &[Row],
    resolver: &mut R,
    log: &dyn Logger,
) -> LocaleOutcome {
    let mut outcome = LocaleOutcome::default();
    for (i, row) in rows.iter().enumerate() {
        match row.get("code") {
            Some(code) if !code.is_empty() => {
                if resolver.resolve(code, log).is_some() {
                    outcome.resolved += 1;
                }
            }
            _ => {
                log.error(&format!("Missing code on row {i}"));
                outcome.rejected_rows += 1;
            }
        }
    }
    outcome
}
