//! Device launcher port — how a device manager brings a device to life.

use ossie_domain::error::OssieError;
use ossie_domain::launch::DeviceLaunchArgs;

/// Launch a device. The launched device binds itself in the naming service
/// under `DomainName1/<DEVICE_LABEL>`.
pub trait DeviceLauncher: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the device cannot be started.
    fn launch(&self, args: &DeviceLaunchArgs) -> Result<(), OssieError>;
}
