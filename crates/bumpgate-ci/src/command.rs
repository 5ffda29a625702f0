//! Translation of abstract verbs into concrete package-manager command lines.
//!
//! | kind  | install          | run            | test       |
//! |-------|------------------|----------------|------------|
//! | npm   | `install <pkgs>` | `run <script>` | `test`     |
//! | yarn  | `add <pkgs>`     | `<script>`     | `test`     |
//! | pnpm  | `add <pkgs>`     | `run <script>` | `run test` |
//! | bun   | `add <pkgs>`     | `run <script>` | `test`     |
//! | shell | -                | `sh -c <cmd>`  | -          |
//!
//! An install with no packages is a lockfile sync and maps to `install` for
//! every package manager.

use std::fmt;

use bumpgate_core::domain::error::{CoreResult, UpgradeError};

use crate::stage::{PackageManagerKind, ScriptConfig};

/// What to ask the package manager to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    /// Add packages, or sync the lockfile when the list is empty.
    Install(Vec<String>),
    /// Run a named script (or, for shell, a literal command).
    Run(String),
    Test,
}

/// Executable plus argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn with_args(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(extra);
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Stateless verb-to-command translation.
pub struct CommandAdapter;

impl CommandAdapter {
    /// Build the command line for `verb` under `kind`.
    pub fn build(kind: PackageManagerKind, verb: &Verb) -> CoreResult<CommandLine> {
        use PackageManagerKind as K;

        let exe = kind.executable();
        let line = match (kind, verb) {
            (K::Shell, Verb::Run(command)) => CommandLine::new(exe, &["-c", command.as_str()]),
            (K::Shell, Verb::Install(_)) | (K::Shell, Verb::Test) => {
                return Err(UpgradeError::ValidationFailed(format!(
                    "shell scripts have no {} verb",
                    match verb {
                        Verb::Test => "test",
                        _ => "install",
                    }
                )))
            }

            (_, Verb::Install(packages)) if packages.is_empty() => {
                CommandLine::new(exe, &["install"])
            }
            (K::Npm, Verb::Install(packages)) => {
                CommandLine::new(exe, &["install"]).with_args(packages.iter().cloned())
            }
            (_, Verb::Install(packages)) => {
                CommandLine::new(exe, &["add"]).with_args(packages.iter().cloned())
            }

            (K::Yarn, Verb::Run(script)) => CommandLine::new(exe, &[script.as_str()]),
            (_, Verb::Run(script)) => CommandLine::new(exe, &["run", script.as_str()]),

            (K::Pnpm, Verb::Test) => CommandLine::new(exe, &["run", "test"]),
            (_, Verb::Test) => CommandLine::new(exe, &["test"]),
        };
        Ok(line)
    }

    /// Interpret a user-supplied script config.
    ///
    /// The first word selects the verb (`install`/`i`, `add`, `test`, `run`);
    /// anything else is taken as a script name. Remaining words are passed
    /// through; for installs, words starting with `-` are flags and the rest
    /// are packages. Shell commands go to `sh -c` untouched.
    pub fn from_script(config: &ScriptConfig) -> CoreResult<CommandLine> {
        config.validate()?;

        if config.kind == PackageManagerKind::Shell {
            return Self::build(config.kind, &Verb::Run(config.command.clone()));
        }

        let mut words = config.command.split_whitespace().map(str::to_string);
        let first = words.next().unwrap_or_default();
        let rest: Vec<String> = words.collect();

        let is_install = match config.kind {
            PackageManagerKind::Yarn => first == "install",
            _ => first == "install" || first == "i",
        };

        if is_install || first == "add" {
            let (flags, packages): (Vec<String>, Vec<String>) =
                rest.into_iter().partition(|w| w.starts_with('-'));
            return Ok(Self::build(config.kind, &Verb::Install(packages))?.with_args(flags));
        }
        if first == "test" {
            return Ok(Self::build(config.kind, &Verb::Test)?.with_args(rest));
        }
        if first == "run" && config.kind != PackageManagerKind::Yarn {
            let mut rest = rest.into_iter();
            let script = rest.next().unwrap_or_default();
            if script.is_empty() {
                return Err(UpgradeError::ValidationFailed(
                    "Script command cannot be empty".to_string(),
                ));
            }
            return Ok(Self::build(config.kind, &Verb::Run(script))?.with_args(rest));
        }
        Ok(Self::build(config.kind, &Verb::Run(first))?.with_args(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpgate_core::UpgradeErrorKind;

    fn line(kind: PackageManagerKind, verb: Verb) -> String {
        CommandAdapter::build(kind, &verb).unwrap().to_string()
    }

    fn script(kind: PackageManagerKind, command: &str) -> String {
        CommandAdapter::from_script(&ScriptConfig::new(kind, command))
            .unwrap()
            .to_string()
    }

    fn pkgs(names: &[&str]) -> Verb {
        Verb::Install(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_install_verbs() {
        use PackageManagerKind::*;
        assert_eq!(line(Npm, pkgs(&["lodash@4.17.21"])), "npm install lodash@4.17.21");
        assert_eq!(line(Yarn, pkgs(&["lodash@4.17.21"])), "yarn add lodash@4.17.21");
        assert_eq!(line(Pnpm, pkgs(&["lodash@4.17.21"])), "pnpm add lodash@4.17.21");
        assert_eq!(line(Bun, pkgs(&["lodash@4.17.21"])), "bun add lodash@4.17.21");
    }

    #[test]
    fn test_sync_is_install_for_every_manager() {
        use PackageManagerKind::*;
        for kind in [Npm, Yarn, Pnpm, Bun] {
            assert_eq!(line(kind, pkgs(&[])), format!("{} install", kind.executable()));
        }
    }

    #[test]
    fn test_run_verbs() {
        use PackageManagerKind::*;
        assert_eq!(line(Npm, Verb::Run("build".into())), "npm run build");
        assert_eq!(line(Yarn, Verb::Run("build".into())), "yarn build");
        assert_eq!(line(Pnpm, Verb::Run("build".into())), "pnpm run build");
        assert_eq!(line(Bun, Verb::Run("build".into())), "bun run build");
    }

    #[test]
    fn test_test_verbs() {
        use PackageManagerKind::*;
        assert_eq!(line(Npm, Verb::Test), "npm test");
        assert_eq!(line(Yarn, Verb::Test), "yarn test");
        assert_eq!(line(Pnpm, Verb::Test), "pnpm run test");
        assert_eq!(line(Bun, Verb::Test), "bun test");
    }

    #[test]
    fn test_shell_passes_command_verbatim() {
        let config = ScriptConfig::shell("npm ci && npm test | tee log");
        let built = CommandAdapter::from_script(&config).unwrap();
        assert_eq!(built.program, "sh");
        assert_eq!(built.args, vec!["-c", "npm ci && npm test | tee log"]);
    }

    #[test]
    fn test_shell_rejects_install_and_test() {
        for verb in [pkgs(&[]), Verb::Test] {
            let err = CommandAdapter::build(PackageManagerKind::Shell, &verb).unwrap_err();
            assert_eq!(err.kind(), UpgradeErrorKind::ValidationFailed);
        }
    }

    #[test]
    fn test_script_parsing() {
        use PackageManagerKind::*;
        assert_eq!(script(Npm, "i"), "npm install");
        assert_eq!(script(Npm, "test --coverage"), "npm test --coverage");
        assert_eq!(script(Npm, "run lint -- --fix"), "npm run lint -- --fix");
        assert_eq!(script(Npm, "typecheck"), "npm run typecheck");
        assert_eq!(
            script(Yarn, "install --frozen-lockfile"),
            "yarn install --frozen-lockfile"
        );
        assert_eq!(script(Pnpm, "add -D vitest"), "pnpm add vitest -D");
        assert_eq!(script(Yarn, "lint"), "yarn lint");
        assert_eq!(script(Pnpm, "test"), "pnpm run test");
        assert_eq!(script(Bun, "build --minify"), "bun run build --minify");
    }

    #[test]
    fn test_script_validation_runs_first() {
        let err = CommandAdapter::from_script(&ScriptConfig::new(PackageManagerKind::Npm, ""))
            .unwrap_err();
        assert_eq!(err.kind(), UpgradeErrorKind::ValidationFailed);

        let err = CommandAdapter::from_script(&ScriptConfig::new(PackageManagerKind::Npm, "run"))
            .unwrap_err();
        assert_eq!(err.kind(), UpgradeErrorKind::ValidationFailed);
    }
}
