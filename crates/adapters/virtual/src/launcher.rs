//! In-process device launcher.

use std::sync::{Arc, Mutex, PoisonError};

use ossie_app::ports::{DeviceLauncher, NamingService};
use ossie_domain::error::OssieError;
use ossie_domain::launch::DeviceLaunchArgs;
use ossie_domain::naming;

use crate::catalog::ComponentCatalog;
use crate::device::VirtualDevice;

/// Creates a [`VirtualDevice`] per launch and binds it under
/// `DomainName1/<DEVICE_LABEL>`, the way a device process announces itself.
pub struct VirtualDeviceLauncher {
    naming: Arc<dyn NamingService>,
    catalog: Arc<ComponentCatalog>,
    launched: Mutex<Vec<Arc<VirtualDevice>>>,
}

impl VirtualDeviceLauncher {
    pub fn new(naming: Arc<dyn NamingService>, catalog: Arc<ComponentCatalog>) -> Self {
        Self {
            naming,
            catalog,
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Devices launched so far, in launch order.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<VirtualDevice>> {
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DeviceLauncher for VirtualDeviceLauncher {
    fn launch(&self, args: &DeviceLaunchArgs) -> Result<(), OssieError> {
        let device = VirtualDevice::new(args, Arc::clone(&self.naming), Arc::clone(&self.catalog));
        self.naming
            .rebind(&naming::in_domain(&args.device_label), device.object())?;
        tracing::info!(device = %args.device_id, label = %args.device_label, "virtual device launched");
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(device);
        Ok(())
    }
}
