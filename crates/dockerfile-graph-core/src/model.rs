use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedDockerfile {
    pub external_images: Vec<ExternalImage>,
    pub stages: Vec<Stage>,
    pub before_first_stage: Vec<Layer>,
}

impl SimplifiedDockerfile {
    // A decimal reference only resolves to a stage before `referencing_stage`.
    pub fn find_stage(&self, reference: &str, referencing_stage: usize) -> Option<usize> {
        self.stages
            .iter()
            .position(|stage| stage.name.as_deref() == Some(reference))
            .or_else(|| stage_index(reference, referencing_stage.min(self.stages.len())))
    }
}

pub(crate) fn stage_index(reference: &str, stage_count: usize) -> Option<usize> {
    if reference.is_empty() || !reference.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    reference
        .parse::<usize>()
        .ok()
        .filter(|index| *index < stage_count)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalImage {
    pub name: String,
}

impl ExternalImage {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Stage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<WaitFor>,
}

impl Layer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            wait_for: None,
        }
    }

    pub fn waiting_for(label: impl Into<String>, wait_for: WaitFor) -> Self {
        Self {
            label: label.into(),
            wait_for: Some(wait_for),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitFor {
    pub name: String,
    pub kind: WaitForKind,
}

impl WaitFor {
    pub fn new(name: impl Into<String>, kind: WaitForKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitForKind {
    From,
    Copy,
    Mount,
}

impl WaitForKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::From => "from",
            Self::Copy => "copy",
            Self::Mount => "mount",
        }
    }
}
