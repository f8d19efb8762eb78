//! Request and response bodies of the CentOS endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// GB of RAM allocated to a new VM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RamGb {
    #[default]
    Four,
    Six,
    Eight,
}

impl TryFrom<u32> for RamGb {
    type Error = String;

    fn try_from(gb: u32) -> Result<Self, Self::Error> {
        match gb {
            4 => Ok(RamGb::Four),
            6 => Ok(RamGb::Six),
            8 => Ok(RamGb::Eight),
            other => Err(format!("ram must be one of 4, 6, 8 (got {})", other)),
        }
    }
}

impl From<RamGb> for u32 {
    fn from(ram: RamGb) -> Self {
        match ram {
            RamGb::Four => 4,
            RamGb::Six => 6,
            RamGb::Eight => 8,
        }
    }
}

/// CPU cores allocated to a new VM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CpuCount {
    #[default]
    Four,
    Eight,
    Twelve,
}

impl TryFrom<u32> for CpuCount {
    type Error = String;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        match count {
            4 => Ok(CpuCount::Four),
            8 => Ok(CpuCount::Eight),
            12 => Ok(CpuCount::Twelve),
            other => Err(format!("cpu-count must be one of 4, 8, 12 (got {})", other)),
        }
    }
}

impl From<CpuCount> for u32 {
    fn from(count: CpuCount) -> Self {
        match count {
            CpuCount::Four => 4,
            CpuCount::Eight => 8,
            CpuCount::Twelve => 12,
        }
    }
}

/// Create a CentOS instance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCentosRequest {
    /// The name to give your CentOS instance
    pub name: String,
    /// The image/version of CentOS to create
    pub image: String,
    /// The network to hook the CentOS instance up to
    pub network: String,
    /// Deploy the VM with a GUI
    #[serde(default)]
    pub desktop: bool,
    /// The number of GB of RAM to allocate to the VM
    #[serde(default)]
    #[schema(value_type = u32, default = 4)]
    pub ram: RamGb,
    /// The number of CPU cores to allocate to the VM
    #[serde(default, rename = "cpu-count")]
    #[schema(value_type = u32, default = 4)]
    pub cpu_count: CpuCount,
}

/// Destroy a CentOS instance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteCentosRequest {
    /// The name of the CentOS instance to destroy
    pub name: String,
}

/// Move a CentOS instance to another network.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModifyNetworkRequest {
    /// The name of the CentOS instance
    pub name: String,
    /// The network to connect the instance to
    pub new_network: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskContent {
    #[serde(rename = "task-id")]
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Acknowledgement of a submitted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskAccepted {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub content: TaskContent,
}
