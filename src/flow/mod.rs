//! RTL-to-GDSII flow actions.
//!
//! Builds the shell commands for the flow's make targets and edits the
//! per-design files (`config.mk`, `constraint.sdc`, `Makefile`). PDK and
//! design names are opaque strings passed straight through.
//!
//! Every command built here is meant for [`crate::shell::ShellBridge::send_anchored`]:
//! paths are relative to the application root unless they are absolute.

mod design;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::shell::quote;

pub use design::{ImportedDesign, MAKEFILE_DEFAULT_CONFIG, REFERENCE_DESIGN, combine_verilog_files};

/// Selection state for flow actions.
#[derive(Debug, Clone)]
pub struct FlowContext {
    /// Directory the shell is re-anchored to before each command.
    pub root: PathBuf,
    /// The flow checkout (holds `Makefile` and `designs/`).
    pub flow_dir: PathBuf,
    pub pdk: Option<String>,
    pub design: Option<String>,
}

impl FlowContext {
    pub fn new(root: impl Into<PathBuf>, flow_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            flow_dir: flow_dir.into(),
            pdk: None,
            design: None,
        }
    }

    /// `flow_dir` resolved against `root`.
    pub fn flow_path(&self) -> PathBuf {
        self.root.join(&self.flow_dir)
    }

    pub fn designs_dir(&self) -> PathBuf {
        self.flow_path().join("designs")
    }

    /// Both PDK and design, if selected.
    pub fn selection(&self) -> Option<(&str, &str)> {
        match (self.pdk.as_deref(), self.design.as_deref()) {
            (Some(pdk), Some(design)) if !pdk.is_empty() && !design.is_empty() => {
                Some((pdk, design))
            }
            _ => None,
        }
    }

    /// `DESIGN_CONFIG` value for the selected design, relative to the flow
    /// directory.
    pub fn design_config(&self) -> Option<String> {
        self.selection()
            .map(|(pdk, design)| format!("./designs/{pdk}/{design}/config.mk"))
    }

    fn cd_flow(&self) -> String {
        format!("cd {}", quote(&self.flow_dir.to_string_lossy()))
    }

    /// Runs `make <target>` for the selected design, or for the flow's
    /// default design when nothing is selected. An empty target runs the
    /// whole flow.
    pub fn make_command(&self, target: &str) -> String {
        let mut cmd = format!("{} && make", self.cd_flow());
        if let Some(config) = self.design_config() {
            cmd.push_str(" DESIGN_CONFIG=");
            cmd.push_str(&config);
        }
        if !target.is_empty() {
            cmd.push(' ');
            cmd.push_str(target);
        }
        cmd
    }

    pub fn step_command(&self, step: Option<FlowStep>) -> String {
        self.make_command(step.map(FlowStep::target).unwrap_or(""))
    }

    pub fn clean_command(&self, step: CleanStep) -> String {
        self.make_command(step.target())
    }

    /// Opens the flow's GUI on the final database.
    pub fn gui_command(&self) -> String {
        self.make_command("gui_final")
    }

    /// Sources the tool environment script next to the flow checkout.
    pub fn source_env_command(&self) -> String {
        let env_sh = self.flow_dir.join("..").join("env.sh");
        format!("source {}", quote(&env_sh.to_string_lossy()))
    }

    /// Directory for the selected design's flow inputs.
    pub fn design_dir(&self) -> Option<PathBuf> {
        self.selection()
            .map(|(pdk, design)| self.designs_dir().join(pdk).join(design))
    }

    /// Directory the design's RTL is imported into.
    pub fn design_src_dir(&self, design: &str) -> PathBuf {
        self.designs_dir().join("src").join(design)
    }

    /// Path of a file in the reference design of the selected PDK.
    pub fn reference_file(&self, pdk: &str, file: DesignFile) -> PathBuf {
        self.designs_dir()
            .join(pdk)
            .join(REFERENCE_DESIGN)
            .join(file.file_name())
    }
}

/// Per-design files the user may edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignFile {
    Config,
    Constraint,
}

impl DesignFile {
    pub fn file_name(self) -> &'static str {
        match self {
            DesignFile::Config => "config.mk",
            DesignFile::Constraint => "constraint.sdc",
        }
    }
}

impl FromStr for DesignFile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" | "config.mk" => Ok(DesignFile::Config),
            "constraint" | "constraint.sdc" | "sdc" => Ok(DesignFile::Constraint),
            other => Err(format!("unknown design file `{other}` (use config.mk or constraint.sdc)")),
        }
    }
}

/// Individual stages of the flow, as make targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    Synth,
    Floorplan,
    Place,
    Cts,
    Route,
    Gds,
    Spef,
    Drc,
    Lvs,
    Report,
}

impl FlowStep {
    pub const ALL: [FlowStep; 10] = [
        FlowStep::Synth,
        FlowStep::Floorplan,
        FlowStep::Place,
        FlowStep::Cts,
        FlowStep::Route,
        FlowStep::Gds,
        FlowStep::Spef,
        FlowStep::Drc,
        FlowStep::Lvs,
        FlowStep::Report,
    ];

    pub fn target(self) -> &'static str {
        match self {
            FlowStep::Synth => "synth",
            FlowStep::Floorplan => "floorplan",
            FlowStep::Place => "place",
            FlowStep::Cts => "cts",
            FlowStep::Route => "route",
            FlowStep::Gds => "gds",
            FlowStep::Spef => "spef",
            FlowStep::Drc => "drc",
            FlowStep::Lvs => "lvs",
            FlowStep::Report => "report",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FlowStep::Synth => "Synthesis",
            FlowStep::Floorplan => "Floorplanning",
            FlowStep::Place => "Placement",
            FlowStep::Cts => "CTS (Clock Tree)",
            FlowStep::Route => "Routing",
            FlowStep::Gds => "GDSII Generation",
            FlowStep::Spef => "SPEF Extraction",
            FlowStep::Drc => "DRC",
            FlowStep::Lvs => "LVS Checks",
            FlowStep::Report => "Final Reports",
        }
    }
}

impl FromStr for FlowStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowStep::ALL
            .into_iter()
            .find(|step| step.target() == s)
            .ok_or_else(|| format!("unknown flow step `{s}`"))
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}

/// Clean targets, from everything down to a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanStep {
    #[default]
    All,
    Synth,
    Floorplan,
    Place,
    Cts,
    Route,
    Finish,
}

impl CleanStep {
    pub const ALL: [CleanStep; 7] = [
        CleanStep::All,
        CleanStep::Synth,
        CleanStep::Floorplan,
        CleanStep::Place,
        CleanStep::Cts,
        CleanStep::Route,
        CleanStep::Finish,
    ];

    pub fn target(self) -> &'static str {
        match self {
            CleanStep::All => "clean_all",
            CleanStep::Synth => "clean_synth",
            CleanStep::Floorplan => "clean_floorplan",
            CleanStep::Place => "clean_place",
            CleanStep::Cts => "clean_cts",
            CleanStep::Route => "clean_route",
            CleanStep::Finish => "clean_finish",
        }
    }
}

impl FromStr for CleanStep {
    type Err = String;

    /// Accepts both `synth` and `clean_synth`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let target = if s.starts_with("clean_") {
            s.to_string()
        } else {
            format!("clean_{s}")
        };
        CleanStep::ALL
            .into_iter()
            .find(|step| step.target() == target)
            .ok_or_else(|| format!("unknown clean step `{s}`"))
    }
}
