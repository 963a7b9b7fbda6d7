use serde::{Deserialize, Serialize};
use std::path::Path;

/// Execution parameters for local-weights models, sized to the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceProfile {
    pub accelerator: bool,
}

impl DeviceProfile {
    pub fn gpu() -> Self {
        Self { accelerator: true }
    }

    pub fn cpu() -> Self {
        Self { accelerator: false }
    }

    pub fn device_map(&self) -> &'static str {
        if self.accelerator { "auto" } else { "cpu" }
    }

    pub fn num_gpus(&self) -> u32 {
        if self.accelerator { 1 } else { 0 }
    }

    pub fn max_out_len(&self) -> u32 {
        if self.accelerator { 100 } else { 20 }
    }

    pub fn batch_size(&self) -> u32 {
        if self.accelerator { 8 } else { 1 }
    }
}

/// Reports the capabilities of the current host. Implementations must not
/// cache: the host can change between runs.
pub trait DeviceProbe: Send + Sync {
    fn probe(&self) -> DeviceProfile;
}

/// Looks for NVIDIA device nodes, honouring `CUDA_VISIBLE_DEVICES`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDeviceProbe;

impl DeviceProbe for SystemDeviceProbe {
    fn probe(&self) -> DeviceProfile {
        if let Ok(visible) = std::env::var("CUDA_VISIBLE_DEVICES") {
            let visible = visible.trim();
            if visible.is_empty() || visible == "-1" {
                tracing::warn!("CUDA_VISIBLE_DEVICES hides every GPU, using CPU profile");
                return DeviceProfile::cpu();
            }
        }

        let has_gpu = Path::new("/dev/nvidia0").exists() || Path::new("/dev/nvidiactl").exists();
        if has_gpu {
            tracing::info!("GPU detected, using accelerator profile");
            DeviceProfile::gpu()
        } else {
            tracing::warn!("No GPU detected, falling back to CPU profile");
            DeviceProfile::cpu()
        }
    }
}

/// Always reports the same profile.
#[derive(Debug, Clone, Copy)]
pub struct FixedDeviceProbe(pub DeviceProfile);

impl DeviceProbe for FixedDeviceProbe {
    fn probe(&self) -> DeviceProfile {
        self.0
    }
}
