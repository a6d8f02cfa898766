//! Multi-target generation: one pipeline run per named target, each with its
//! own include set, header and artifact, over a shared root.

use crate::config::PackConfig;
use crate::error::{AppError, Result};
use crate::packager::{PackResult, pack, packable_paths};
use crate::remote::{RemoteSourceProvider, ScopedSource};
use rayon::prelude::*;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_JOBS: usize = 4;

#[derive(RustEmbed)]
#[folder = "../data/presets/"]
struct PresetAssets;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    /// Artifact file name, relative to the output directory.
    pub output: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default = "default_true")]
    pub with_common: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub common: Vec<String>,
    pub targets: Vec<TargetSpec>,
}

impl TargetSet {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let set: TargetSet = serde_yml::from_str(yaml)?;
        set.validate()?;
        Ok(set)
    }

    /// Loads an embedded preset such as `nextjs`.
    pub fn preset(name: &str) -> Result<Self> {
        let file_path = format!("{}.yaml", name);
        log::trace!("Loading embedded preset: {}", file_path);
        let asset = PresetAssets::get(&file_path).ok_or_else(|| {
            AppError::Config(format!(
                "Unknown preset \"{}\" (available: {})",
                name,
                Self::available_presets().join(", ")
            ))
        })?;
        let yaml = std::str::from_utf8(asset.data.as_ref()).map_err(|e| {
            AppError::Config(format!("UTF-8 error in embedded preset {}: {}", file_path, e))
        })?;
        Self::from_yaml(yaml)
    }

    pub fn available_presets() -> Vec<String> {
        let mut names: Vec<String> = PresetAssets::iter()
            .filter_map(|f| f.strip_suffix(".yaml").map(str::to_string))
            .collect();
        names.sort();
        names
    }

    pub fn target(&self, name: &str) -> Option<&TargetSpec> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// The target's own patterns followed by the common ones, deduplicated.
    pub fn include_for(&self, target: &TargetSpec) -> Vec<String> {
        let mut seen = HashSet::new();
        let common: &[String] = if target.with_common { &self.common } else { &[] };
        target
            .include
            .iter()
            .chain(common.iter())
            .filter(|p| seen.insert(p.as_str()))
            .cloned()
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(AppError::Config("Target set declares no targets".into()));
        }
        let mut names = HashSet::new();
        let mut outputs = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return Err(AppError::Config("Target with an empty name".into()));
            }
            if !names.insert(target.name.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate target name \"{}\"",
                    target.name
                )));
            }
            let output = Path::new(&target.output);
            let escapes = output
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if target.output.trim().is_empty() || escapes {
                return Err(AppError::Config(format!(
                    "Target \"{}\" has invalid output \"{}\" (must be a plain relative path)",
                    target.name, target.output
                )));
            }
            if !outputs.insert(output) {
                return Err(AppError::Config(format!(
                    "Targets share the output \"{}\"",
                    target.output
                )));
            }
            if target.include.is_empty() && (!target.with_common || self.common.is_empty()) {
                return Err(AppError::Config(format!(
                    "Target \"{}\" selects no patterns",
                    target.name
                )));
            }
        }
        Ok(())
    }
}

/// Result of one target's run. A failure here never affects other targets.
#[derive(Debug)]
pub struct TargetOutcome {
    pub name: String,
    pub output_path: PathBuf,
    pub result: Result<PackResult>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct MultiTargetGenerator {
    base: PackConfig,
    output_dir: PathBuf,
    jobs: usize,
}

impl MultiTargetGenerator {
    /// `base` supplies the root, style, line numbering, top-files count and
    /// ignore settings shared by every target.
    pub fn new(base: PackConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base,
            output_dir: output_dir.into(),
            jobs: DEFAULT_JOBS,
        }
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn with_root(&self, root: &Path) -> Result<Self> {
        Ok(Self {
            base: self.base.to_builder().root_directory(root).build()?,
            output_dir: self.output_dir.clone(),
            jobs: self.jobs,
        })
    }

    pub fn target_config(&self, set: &TargetSet, target: &TargetSpec) -> Result<PackConfig> {
        self.base
            .to_builder()
            .include(set.include_for(target))
            .header_text(target.description.clone())
            .output_path(self.output_dir.join(&target.output))
            .excluded_paths(set.targets.iter().map(|t| self.output_dir.join(&t.output)))
            .build()
            .map_err(|e| AppError::Target {
                name: target.name.clone(),
                source: Box::new(e),
            })
    }

    /// Paths the target would pack, without reading or writing anything.
    pub fn resolve_target_files(&self, set: &TargetSet, target: &TargetSpec) -> Result<Vec<String>> {
        packable_paths(&self.target_config(set, target)?)
    }

    /// Created up front so every target resolves sibling artifacts against the
    /// same directory. A failure here resurfaces per target when writing.
    fn prepare_output_dir(&self) {
        if let Err(e) = std::fs::create_dir_all(&self.output_dir) {
            log::warn!(
                "Could not create output directory {}: {}",
                self.output_dir.display(),
                e
            );
        }
    }

    fn run_target(&self, set: &TargetSet, target: &TargetSpec) -> TargetOutcome {
        let output_path = self.output_dir.join(&target.output);
        log::info!("Generating target '{}' -> {}", target.name, output_path.display());
        let result = self
            .target_config(set, target)
            .and_then(|config| pack(&config))
            .map_err(|e| match e {
                AppError::Target { .. } => e,
                other => AppError::Target {
                    name: target.name.clone(),
                    source: Box::new(other),
                },
            });
        if let Err(e) = &result {
            log::warn!("{}", e);
        }
        TargetOutcome {
            name: target.name.clone(),
            output_path,
            result,
        }
    }

    /// Runs every target on a pool of `jobs` threads. Outcomes follow the
    /// declaration order of `set.targets`.
    pub fn generate(&self, set: &TargetSet) -> Vec<TargetOutcome> {
        log::debug!(
            "Generating {} targets with {} jobs",
            set.targets.len(),
            self.jobs
        );
        self.prepare_output_dir();
        match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
            Ok(pool) => pool.install(|| {
                set.targets
                    .par_iter()
                    .map(|target| self.run_target(set, target))
                    .collect()
            }),
            Err(e) => {
                log::warn!("Could not build target pool ({}), running sequentially", e);
                set.targets
                    .iter()
                    .map(|target| self.run_target(set, target))
                    .collect()
            }
        }
    }

    /// Runs targets in order and stops at the first failure.
    pub fn generate_fail_fast(&self, set: &TargetSet) -> Result<Vec<TargetOutcome>> {
        self.prepare_output_dir();
        let mut outcomes = Vec::with_capacity(set.targets.len());
        for target in &set.targets {
            let TargetOutcome {
                name,
                output_path,
                result,
            } = self.run_target(set, target);
            outcomes.push(TargetOutcome {
                name,
                output_path,
                result: Ok(result?),
            });
        }
        Ok(outcomes)
    }

    /// Materializes `url` once and runs the whole batch against it.
    pub fn generate_remote(
        &self,
        provider: &dyn RemoteSourceProvider,
        url: &str,
        set: &TargetSet,
        fail_fast: bool,
    ) -> Result<Vec<TargetOutcome>> {
        let scope = ScopedSource::acquire(provider, url)?;
        let generator = self.with_root(scope.root())?;
        let outcomes = if fail_fast {
            generator.generate_fail_fast(set)
        } else {
            Ok(generator.generate(set))
        };
        if let Err(e) = scope.release() {
            log::warn!("Failed to release remote snapshot for {}: {}", url, e);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::remote::tests::FakeProvider;
    use std::fs;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn routes_set() -> TargetSet {
        TargetSet::from_yaml(
            r#"
common: ["utils/**"]
targets:
  - name: common
    output: common.txt
    description: Shared files
  - name: api-routes
    output: api-routes.txt
    description: Routes and shared files
    include: ["app/**/route.ts"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn targets_merge_common_patterns_without_duplicates() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(root.path(), "utils/helper.ts", "export const h = 1;\n");
        write(root.path(), "app/a/route.ts", "export function GET() {}\n");

        let set = routes_set();
        let base = PackConfig::builder(root.path()).build().unwrap();
        let generator = MultiTargetGenerator::new(base, out.path());

        let routes = set.target("api-routes").unwrap();
        assert_eq!(
            generator.resolve_target_files(&set, routes).unwrap(),
            vec!["app/a/route.ts", "utils/helper.ts"]
        );

        let outcomes = generator.generate(&set);
        let names: Vec<_> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["common", "api-routes"]);
        assert!(outcomes.iter().all(TargetOutcome::is_success));

        let common = fs::read_to_string(out.path().join("common.txt")).unwrap();
        assert!(common.contains("File: utils/helper.ts"));
        assert!(!common.contains("route.ts"));
        assert!(common.contains("Shared files"));

        let api = fs::read_to_string(out.path().join("api-routes.txt")).unwrap();
        assert_eq!(api.matches("File: utils/helper.ts").count(), 1);
        assert_eq!(api.matches("File: app/a/route.ts").count(), 1);
    }

    #[test]
    fn a_failing_target_does_not_stop_the_others() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(root.path(), "utils/helper.ts", "x\n");
        // A directory where the api-routes artifact should go makes its write fail.
        fs::create_dir_all(out.path().join("api-routes.txt")).unwrap();

        let set = routes_set();
        let base = PackConfig::builder(root.path()).build().unwrap();
        let generator = MultiTargetGenerator::new(base, out.path()).jobs(2);

        let outcomes = generator.generate(&set);
        assert!(outcomes[0].is_success());
        let err = outcomes[1].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("api-routes"));

        let fail_fast = generator.generate_fail_fast(&set).unwrap_err();
        assert!(matches!(fail_fast, AppError::Target { ref name, .. } if name == "api-routes"));
    }

    #[test]
    fn nextjs_preset_declares_targets_in_order() {
        let set = TargetSet::preset("nextjs").unwrap();
        let names: Vec<_> = set.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["common", "api-routes", "pages", "layouts", "all"]);
        assert_eq!(set.common, vec!["src/!(app)/**/*"]);
        let all = set.target("all").unwrap();
        assert_eq!(set.include_for(all), vec!["src/**/*"]);
        assert!(TargetSet::available_presets().contains(&"nextjs".to_string()));
        assert!(TargetSet::preset("rails").is_err());
    }

    #[test]
    fn nextjs_preset_selects_expected_files() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(root.path(), "src/utils/helper.ts", "h\n");
        write(root.path(), "src/app/api/users/route.ts", "r\n");
        write(root.path(), "src/app/home/page.tsx", "p\n");
        write(root.path(), "src/app/layout.tsx", "l\n");

        let set = TargetSet::preset("nextjs").unwrap();
        let generator =
            MultiTargetGenerator::new(PackConfig::builder(root.path()).build().unwrap(), out.path());
        let files = |name: &str| {
            generator
                .resolve_target_files(&set, set.target(name).unwrap())
                .unwrap()
        };
        assert_eq!(files("common"), vec!["src/utils/helper.ts"]);
        assert_eq!(
            files("api-routes"),
            vec!["src/app/api/users/route.ts", "src/utils/helper.ts"]
        );
        assert_eq!(files("pages"), vec!["src/app/home/page.tsx", "src/utils/helper.ts"]);
        assert_eq!(files("layouts"), vec!["src/app/layout.tsx", "src/utils/helper.ts"]);
        assert_eq!(files("all").len(), 4);
    }

    #[test]
    fn invalid_target_sets_are_rejected() {
        let dup = "targets:\n  - {name: a, output: a.txt, include: [x]}\n  - {name: a, output: b.txt, include: [y]}\n";
        assert!(TargetSet::from_yaml(dup).is_err());
        let escape = "targets:\n  - {name: a, output: ../a.txt, include: [x]}\n";
        assert!(TargetSet::from_yaml(escape).is_err());
        let empty = "targets:\n  - {name: a, output: a.txt}\n";
        assert!(TargetSet::from_yaml(empty).is_err());
    }

    #[test]
    fn targets_sharing_an_output_are_rejected() {
        let shared = "targets:\n  - {name: a, output: out/pack.txt, include: [x]}\n  - {name: b, output: out/pack.txt, include: [y]}\n";
        let err = TargetSet::from_yaml(shared).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("out/pack.txt"));

        let distinct = "targets:\n  - {name: a, output: out/a.txt, include: [x]}\n  - {name: b, output: out/b.txt, include: [y]}\n";
        assert!(TargetSet::from_yaml(distinct).is_ok());
    }

    #[test]
    fn output_dir_inside_root_never_packs_sibling_artifacts() {
        let root = TempDir::new().unwrap();
        write(root.path(), "src/utils/helper.ts", "h\n");
        write(root.path(), "src/app/api/users/route.ts", "r\n");
        write(root.path(), "src/app/layout.tsx", "l\n");
        let output_dir = root.path().join("src/packs");

        let set = TargetSet::preset("nextjs").unwrap();
        let generator =
            MultiTargetGenerator::new(PackConfig::builder(root.path()).build().unwrap(), &output_dir);

        let run = || {
            let outcomes = generator.generate(&set);
            assert!(outcomes.iter().all(TargetOutcome::is_success));
            set.targets
                .iter()
                .map(|t| fs::read_to_string(output_dir.join(&t.output)).unwrap())
                .collect::<Vec<_>>()
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);

        let all = fs::read_to_string(output_dir.join("repopack-all.txt")).unwrap();
        assert!(all.contains("File: src/app/layout.tsx"));
        assert!(!all.contains("src/packs/"));
        let common = fs::read_to_string(output_dir.join("repopack-common.txt")).unwrap();
        assert!(!common.contains("src/packs/"));
        assert_eq!(
            generator
                .resolve_target_files(&set, set.target("all").unwrap())
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn remote_batch_shares_one_snapshot() {
        let out = TempDir::new().unwrap();
        let provider = FakeProvider::default();
        let set = TargetSet::from_yaml(
            "targets:\n  - {name: main, output: main.txt, include: [\"src/**\"]}\n  - {name: all, output: all.txt, include: [\"**\"]}\n",
        )
        .unwrap();
        let generator =
            MultiTargetGenerator::new(PackConfig::builder("unused").build().unwrap(), out.path());

        let outcomes = generator
            .generate_remote(&provider, "owner/repo", &set, false)
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(TargetOutcome::is_success));
        assert_eq!(provider.releases.load(Ordering::SeqCst), 1);
        assert!(
            fs::read_to_string(out.path().join("main.txt"))
                .unwrap()
                .contains("File: src/main.ts")
        );
    }
}
