// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in pipelines.
//!
//! Each preset is the step list one CI builder runs against a checked-out
//! source tree. The zcash presets clean the tree, run their pre-build steps,
//! build and fetch the proving parameters; the build and the fetch halt the
//! pipeline on failure. The Rust presets install a nightly toolchain into
//! `./rust-nightly` first.

use crate::config::Settings;
use benchwatch_runner::process::CommandSpec;
use benchwatch_runner::steps::initial_block_download::IBD_SIGTERM_GRACE;
use benchwatch_runner::steps::{
    CargoBenchStep, DirectoryStep, ExpectedFailuresStep, InitialBlockDownloadStep,
    PerformanceStep, ShellStep, StageExpander,
};
use benchwatch_runner::{Pipeline, PublishStep};
use clap::ValueEnum;
use std::fmt;
use std::time::Duration;

/// UTXO wallet fixture fetched by the performance preset.
pub const UTXO_FIXTURE_URL: &str =
    "https://z.cash/downloads/benchmarks/benchmark-200k-UTXOs.tar.xz";

/// Where nightly toolchain archives are downloaded from.
pub const RUST_DIST_URL: &str = "https://static.rust-lang.org/dist";

/// Bound on each sanitizer test stage.
pub const SANITIZER_TIMEOUT: Duration = Duration::from_secs(1200);

/// `CONFIGURE_FLAGS` shared by every zcash build.
pub const CONFIGURE_FLAGS: &str = "--enable-werror";

const ASAN_OPTIONS: &str =
    "symbolize=1:report_globals=1:check_initialization_order=true:detect_stack_use_after_return=true";

/// Python virtualenv holding the lint and test tooling.
const VENV_PATH: &str = "${HOME}/venv/bin:${PATH}";

/// Toolchain installed by [`install_nightly`].
const NIGHTLY_PATH: &str = "./rust-nightly/bin:${PATH}";

/// A built-in pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Time and memory suite, published.
    Performance,
    /// Valgrind instruction counts.
    Valgrind,
    /// Initial block download timing, published.
    InitialBlockDownload,
    /// Lint, then one step per test stage.
    MergeTest,
    /// Merge test of a build with Proton enabled.
    ProtonMergeTest,
    /// Expected-failure test gate.
    ExpectedFailures,
    /// AddressSanitizer test stages.
    Sanitizers,
    /// ThreadSanitizer test stages.
    ThreadSanitizer,
    /// Coverage report of an lcov build.
    Coverage,
    /// Checks the depends source mirror.
    CheckDepends,
    /// `cargo bench` results, published.
    CargoBench,
    /// `cargo test` of the Sapling crypto library.
    SaplingTest,
}

impl Preset {
    /// All presets, in listing order.
    pub const ALL: [Preset; 12] = [
        Preset::Performance,
        Preset::Valgrind,
        Preset::InitialBlockDownload,
        Preset::MergeTest,
        Preset::ProtonMergeTest,
        Preset::ExpectedFailures,
        Preset::Sanitizers,
        Preset::ThreadSanitizer,
        Preset::Coverage,
        Preset::CheckDepends,
        Preset::CargoBench,
        Preset::SaplingTest,
    ];

    /// Kebab-case name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Performance => "performance",
            Preset::Valgrind => "valgrind",
            Preset::InitialBlockDownload => "initial-block-download",
            Preset::MergeTest => "merge-test",
            Preset::ProtonMergeTest => "proton-merge-test",
            Preset::ExpectedFailures => "expected-failures",
            Preset::Sanitizers => "sanitizers",
            Preset::ThreadSanitizer => "thread-sanitizer",
            Preset::Coverage => "coverage",
            Preset::CheckDepends => "check-depends",
            Preset::CargoBench => "cargo-bench",
            Preset::SaplingTest => "sapling-test",
        }
    }

    /// One-line description.
    pub fn description(&self) -> &'static str {
        match self {
            Preset::Performance => "time and memory benchmarks, published to the dashboard",
            Preset::Valgrind => "valgrind measurements of the proving and mining benchmarks",
            Preset::InitialBlockDownload => "time a node's initial block download, published",
            Preset::MergeTest => "pyflakes lint, then every test stage the driver lists",
            Preset::ProtonMergeTest => "merge test of a build with --enable-proton",
            Preset::ExpectedFailures => "run the expected-failure tests; pass only if none pass",
            Preset::Sanitizers => "btest and gtest under AddressSanitizer",
            Preset::ThreadSanitizer => "btest and gtest under ThreadSanitizer",
            Preset::Coverage => "lcov build and `make cov`",
            Preset::CheckDepends => "check that every depends source is mirrored",
            Preset::CargoBench => "cargo bench cases of the pairing library, published",
            Preset::SaplingTest => "cargo test --release on a nightly toolchain",
        }
    }

    /// Build the pipeline.
    pub fn pipeline(&self, settings: &Settings) -> Pipeline {
        match self {
            Preset::Performance => performance(settings),
            Preset::Valgrind => valgrind(settings),
            Preset::InitialBlockDownload => initial_block_download(settings),
            Preset::MergeTest => merge_test(ZcashBuild::new(settings), "merge-test", settings),
            Preset::ProtonMergeTest => merge_test(
                ZcashBuild::new(settings).build_arg("--enable-proton"),
                "proton-merge-test",
                settings,
            ),
            Preset::ExpectedFailures => ZcashBuild::new(settings)
                .pipeline("expected-failures")
                .with_step(ExpectedFailuresStep::default()),
            Preset::Sanitizers => address_sanitizer(settings),
            Preset::ThreadSanitizer => thread_sanitizer(settings),
            Preset::Coverage => ZcashBuild::new(settings)
                .configure_flag("--enable-lcov")
                .configure_flag("--disable-hardening")
                .pipeline("coverage")
                .with_step(ShellStep::new("make cov", CommandSpec::new("make").arg("cov"))),
            Preset::CheckDepends => ZcashBuild::new(settings)
                .pipeline("check-depends")
                .with_step(ShellStep::new(
                    "test-depends-sources-mirror.py",
                    CommandSpec::new("./qa/zcash/test-depends-sources-mirror.py"),
                )),
            Preset::CargoBench => cargo_bench(settings),
            Preset::SaplingTest => sapling_test(settings),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn git_clean() -> ShellStep {
    ShellStep::new("git clean", CommandSpec::new("git").args(["clean", "-dfx"]))
}

/// Common head of the zcash presets.
struct ZcashBuild<'a> {
    settings: &'a Settings,
    configure_flags: Vec<&'static str>,
    build_args: Vec<&'static str>,
    pre_build: Vec<ShellStep>,
}

impl<'a> ZcashBuild<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            configure_flags: vec![CONFIGURE_FLAGS],
            build_args: Vec::new(),
            pre_build: Vec::new(),
        }
    }

    fn configure_flag(mut self, flag: &'static str) -> Self {
        self.configure_flags.push(flag);
        self
    }

    fn build_arg(mut self, arg: &'static str) -> Self {
        self.build_args.push(arg);
        self
    }

    /// Runs between `git clean` and the build.
    fn pre_build(mut self, step: ShellStep) -> Self {
        self.pre_build.push(step);
        self
    }

    fn build_step(&self) -> ShellStep {
        let mut script = String::from("./zcutil/build.sh");
        for arg in &self.build_args {
            script.push(' ');
            script.push_str(arg);
        }
        script.push_str(" -j$(nproc)");
        ShellStep::new(
            "build.sh",
            CommandSpec::new("sh")
                .arg("-c")
                .arg(script)
                .env("CONFIGURE_FLAGS", self.configure_flags.join(" ")),
        )
        .halt_on_failure(true)
    }

    /// Parameter fetch; workers share the parameter directory, so it is locked.
    fn fetch_params(&self) -> ShellStep {
        ShellStep::new(
            "fetch-params.sh",
            CommandSpec::new("./zcutil/fetch-params.sh").arg("--testnet"),
        )
        .halt_on_failure(true)
        .with_lock(&self.settings.paths.fetch_lock)
    }

    fn pipeline(self, name: &str) -> Pipeline {
        let build = self.build_step();
        let fetch = self.fetch_params();
        let mut pipeline = Pipeline::new(name).with_step(git_clean());
        for step in self.pre_build {
            pipeline = pipeline.with_step(step);
        }
        pipeline.with_step(build).with_step(fetch)
    }
}

struct Measure<'a> {
    settings: &'a Settings,
}

impl Measure<'_> {
    fn script(&self) -> CommandSpec {
        CommandSpec::new(&self.settings.paths.measurement_script)
    }

    fn time(&self, benchmark: &str) -> PerformanceStep {
        PerformanceStep::time(benchmark)
            .with_script(self.script())
            .with_median_convention(self.settings.stats.median_convention)
    }

    fn memory(&self, benchmark: &str) -> PerformanceStep {
        PerformanceStep::memory(benchmark).with_script(self.script())
    }

    fn valgrind(&self, benchmark: &str) -> PerformanceStep {
        PerformanceStep::valgrind(benchmark).with_script(self.script())
    }
}

const CORE_BENCHMARKS: [&str; 5] = [
    "sleep",
    "parameterloading",
    "createjoinsplit",
    "verifyjoinsplit",
    "solveequihash",
];

fn download_utxo_fixture() -> ShellStep {
    ShellStep::new(
        "download benchmark-200k-UTXOs.tar.xz",
        CommandSpec::new("wget").args(["-N", UTXO_FIXTURE_URL]),
    )
}

fn performance(settings: &Settings) -> Pipeline {
    let m = Measure { settings };
    let mut pipeline = ZcashBuild::new(settings)
        .pipeline("performance")
        .with_step(download_utxo_fixture());

    for benchmark in CORE_BENCHMARKS {
        pipeline = pipeline.with_step(m.time(benchmark));
    }
    pipeline = pipeline
        .with_step(
            m.time("solveequihash")
                .with_args(["2"])
                .named("time solveequihash 2 threads"),
        )
        .with_step(m.time("verifyequihash"))
        .with_step(m.time("validatelargetx"))
        .with_step(m.time("connectblockslow"));

    for wallet in ["recv", "send"] {
        for (amount, suffix) in [("0.0009", "1"), ("0.0099", "10"), ("0.0999", "100")] {
            pipeline = pipeline.with_step(
                m.time("sendtoaddress")
                    .with_args([format!("200k-{wallet}"), amount.to_string()])
                    .named(format!("time-sendtoaddress-200k-{wallet}-{suffix}")),
            );
        }
    }
    pipeline = pipeline
        .with_step(
            m.time("loadwallet")
                .with_args(["200k-recv"])
                .named("time-loadwallet-200k-recv"),
        )
        .with_step(
            m.time("listunspent")
                .with_args(["200k-recv"])
                .named("time-listunspent-200k-recv"),
        );

    for benchmark in CORE_BENCHMARKS {
        pipeline = pipeline.with_step(m.memory(benchmark));
    }
    pipeline
        .with_step(
            m.memory("solveequihash")
                .with_args(["2"])
                .named("memory solveequihash 2 threads"),
        )
        .with_step(m.memory("verifyequihash"))
        .with_step(m.memory("validatelargetx"))
        .with_step(m.memory("connectblockslow"))
        .with_step(
            m.memory("sendtoaddress")
                .with_args(["200k-recv", "0.0999"])
                .named("memory-sendtoaddress-200k-recv-100"),
        )
        .with_step(
            m.memory("loadwallet")
                .with_args(["200k-recv"])
                .named("memory-loadwallet-200k-recv"),
        )
        .with_step(
            m.memory("listunspent")
                .with_args(["200k-recv"])
                .named("memory-listunspent-200k-recv"),
        )
        .with_step(PublishStep::new(settings.publish.clone()))
}

fn valgrind(settings: &Settings) -> Pipeline {
    let m = Measure { settings };
    let mut pipeline = ZcashBuild::new(settings).pipeline("valgrind");
    for benchmark in CORE_BENCHMARKS {
        pipeline = pipeline.with_step(m.valgrind(benchmark));
    }
    pipeline
        .with_step(
            m.valgrind("solveequihash")
                .with_args(["2"])
                .named("valgrind solveequihash 2 threads"),
        )
        .with_step(m.valgrind("verifyequihash"))
        .with_step(m.valgrind("connectblockslow"))
}

fn initial_block_download(settings: &Settings) -> Pipeline {
    let datadir = &settings.paths.ibd_datadir;
    ZcashBuild::new(settings)
        .pipeline("initial-block-download")
        .with_step(DirectoryStep::create("create datadir", datadir))
        .with_step(ShellStep::new(
            "create zcash.conf",
            CommandSpec::new("touch").arg(datadir.join("zcash.conf").display().to_string()),
        ))
        .with_step(
            InitialBlockDownloadStep::new(datadir)
                .with_node(CommandSpec::new(&settings.paths.node).sigterm_grace(IBD_SIGTERM_GRACE)),
        )
        .with_step(DirectoryStep::remove("remove datadir", datadir))
        .with_step(PublishStep::new(settings.publish.clone()))
}

/// Lint that runs even when the build later fails.
fn pyflakes() -> ShellStep {
    ShellStep::new(
        "pyflakes",
        CommandSpec::new("pyflakes")
            .args(["qa", "src", "zcutil"])
            .env("PATH", VENV_PATH),
    )
    .always_run(true)
}

fn merge_test(build: ZcashBuild<'_>, name: &str, settings: &Settings) -> Pipeline {
    build.pre_build(pyflakes()).pipeline(name).with_step(
        StageExpander::new(CommandSpec::new(&settings.paths.test_driver))
            .with_stage_env("PATH", VENV_PATH),
    )
}

fn sanitizer_stages(
    mut pipeline: Pipeline,
    settings: &Settings,
    env: &[(&str, &str)],
) -> Pipeline {
    for stage in ["btest", "gtest"] {
        pipeline = pipeline.with_step(ShellStep::new(
            stage,
            CommandSpec::new(&settings.paths.test_driver)
                .arg(stage)
                .envs(env.iter().copied())
                .timeout(SANITIZER_TIMEOUT),
        ));
    }
    pipeline
}

fn address_sanitizer(settings: &Settings) -> Pipeline {
    let pipeline = ZcashBuild::new(settings)
        .configure_flag("--enable-asan")
        .pipeline("sanitizers");
    sanitizer_stages(
        pipeline,
        settings,
        &[
            ("ASAN_OPTIONS", ASAN_OPTIONS),
            ("ASAN_SYMBOLIZER_PATH", settings.paths.llvm_symbolizer.as_str()),
            ("PATH", VENV_PATH),
        ],
    )
}

fn thread_sanitizer(settings: &Settings) -> Pipeline {
    let pipeline = ZcashBuild::new(settings)
        .configure_flag("--enable-tsan")
        .pipeline("thread-sanitizer");
    sanitizer_stages(pipeline, settings, &[("PATH", VENV_PATH)])
}

/// Download, unpack and install the nightly toolchain into `./rust-nightly`.
fn install_nightly(pipeline: Pipeline, target: &str) -> Pipeline {
    let dist = format!("rust-nightly-{target}");
    let archive = format!("{dist}.tar.gz");
    pipeline
        .with_step(ShellStep::new(
            "download latest nightly Rust",
            CommandSpec::new("wget").args(["-N".to_string(), format!("{RUST_DIST_URL}/{archive}")]),
        ))
        .with_step(ShellStep::new(
            "extract Rust",
            CommandSpec::new("tar").args(["xzf", archive.as_str()]),
        ))
        .with_step(ShellStep::new(
            "install Rust",
            CommandSpec::new(format!("./{dist}/install.sh")).arg("--prefix=./rust-nightly"),
        ))
        .with_step(ShellStep::new(
            "rustc version",
            CommandSpec::new("rustc")
                .arg("--version")
                .env("PATH", NIGHTLY_PATH),
        ))
}

fn cargo_bench(settings: &Settings) -> Pipeline {
    let bench = &settings.cargo_bench;
    let pipeline = Pipeline::new("cargo-bench").with_step(git_clean());
    install_nightly(pipeline, &bench.nightly_target)
        .with_step(
            CargoBenchStep::new(&bench.project, &bench.executable)
                .with_args(bench.args.iter().cloned())
                .with_env("PATH", NIGHTLY_PATH),
        )
        .with_step(PublishStep::new(settings.publish.clone()))
}

fn sapling_test(settings: &Settings) -> Pipeline {
    let pipeline = Pipeline::new("sapling-test").with_step(git_clean());
    install_nightly(pipeline, &settings.cargo_bench.nightly_target).with_step(ShellStep::new(
        "cargo test",
        CommandSpec::new("cargo")
            .args(["test", "--release"])
            .env("PATH", NIGHTLY_PATH),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchwatch_runner::Step;
    use pretty_assertions::assert_eq;

    fn names(preset: Preset) -> Vec<String> {
        preset
            .pipeline(&Settings::default())
            .step_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_every_preset_builds() {
        for preset in Preset::ALL {
            let pipeline = preset.pipeline(&Settings::default());
            assert!(!pipeline.is_empty(), "{preset} is empty");
        }
    }

    #[test]
    fn test_names_round_trip_through_clap() {
        for preset in Preset::ALL {
            assert_eq!(Preset::from_str(preset.as_str(), false).unwrap(), preset);
        }
    }

    #[test]
    fn test_zcash_presets_build_then_fetch() {
        for preset in [
            Preset::Performance,
            Preset::Valgrind,
            Preset::ExpectedFailures,
            Preset::Sanitizers,
            Preset::ThreadSanitizer,
            Preset::Coverage,
            Preset::CheckDepends,
        ] {
            let names = names(preset);
            assert_eq!(&names[..3], ["git clean", "build.sh", "fetch-params.sh"], "{preset}");
        }
    }

    #[test]
    fn test_build_step_flags() {
        let settings = Settings::default();
        let build = ZcashBuild::new(&settings)
            .configure_flag("--enable-tsan")
            .build_arg("--enable-proton")
            .build_step();
        assert!(Step::halt_on_failure(&build));
        let command = build.command();
        assert_eq!(
            command.to_string(),
            "sh -c ./zcutil/build.sh --enable-proton -j$(nproc)"
        );
        assert_eq!(
            command.env.get("CONFIGURE_FLAGS").map(String::as_str),
            Some("--enable-werror --enable-tsan")
        );
    }

    #[test]
    fn test_utxo_fixture_download() {
        assert_eq!(
            download_utxo_fixture().command().to_string(),
            "wget -N https://z.cash/downloads/benchmarks/benchmark-200k-UTXOs.tar.xz"
        );
    }

    #[test]
    fn test_performance_step_list() {
        let names = names(Preset::Performance);
        assert_eq!(names.len(), 3 + 1 + 9 + 6 + 2 + 12 + 1);
        assert_eq!(names[3], "download benchmark-200k-UTXOs.tar.xz");
        assert_eq!(names[4], "time sleep");
        assert!(names.contains(&"time solveequihash 2 threads".to_string()));
        assert!(names.contains(&"time-sendtoaddress-200k-send-10".to_string()));
        assert!(names.contains(&"memory-sendtoaddress-200k-recv-100".to_string()));
        assert_eq!(names.last().map(String::as_str), Some("publish results"));
    }

    #[test]
    fn test_initial_block_download_cleans_up_before_publish() {
        let names = names(Preset::InitialBlockDownload);
        let tail: Vec<&str> = names[3..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            [
                "create datadir",
                "create zcash.conf",
                "time-InitialBlockDownload",
                "remove datadir",
                "publish results",
            ]
        );
    }

    #[test]
    fn test_merge_test_lints_after_clean_and_expands_last() {
        let expected = ["git clean", "pyflakes", "build.sh", "fetch-params.sh", "list-stages"];
        assert_eq!(names(Preset::MergeTest), expected);
        assert_eq!(names(Preset::ProtonMergeTest), expected);
        assert!(Step::always_run(&pyflakes()));
    }

    #[test]
    fn test_thread_sanitizer_runs_both_stages() {
        let names = names(Preset::ThreadSanitizer);
        assert_eq!(&names[3..], ["btest", "gtest"]);
    }

    #[test]
    fn test_cargo_bench_installs_nightly_first() {
        assert_eq!(
            names(Preset::CargoBench),
            [
                "git clean",
                "download latest nightly Rust",
                "extract Rust",
                "install Rust",
                "rustc version",
                "cargo bench",
                "publish results",
            ]
        );
    }

    #[test]
    fn test_nightly_install_commands() {
        let settings = Settings::default();
        let pipeline = sapling_test(&settings);
        assert_eq!(pipeline.step_names().last().copied(), Some("cargo test"));

        let install = install_nightly(Pipeline::new("x"), "aarch64-unknown-linux-gnu");
        assert_eq!(
            install.step_names(),
            [
                "download latest nightly Rust",
                "extract Rust",
                "install Rust",
                "rustc version"
            ]
        );
    }
}
