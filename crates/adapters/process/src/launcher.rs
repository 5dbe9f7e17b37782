//! Launcher hosting process devices in the node process.

use std::sync::{Arc, Mutex, PoisonError};

use ossie_app::ports::{DeviceLauncher, NamingService};
use ossie_domain::error::OssieError;
use ossie_domain::launch::DeviceLaunchArgs;
use ossie_domain::naming;

use crate::device::ProcessDevice;

pub struct ProcessDeviceLauncher {
    naming: Arc<dyn NamingService>,
    launched: Mutex<Vec<Arc<ProcessDevice>>>,
}

impl ProcessDeviceLauncher {
    pub fn new(naming: Arc<dyn NamingService>) -> Self {
        Self {
            naming,
            launched: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn devices(&self) -> Vec<Arc<ProcessDevice>> {
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DeviceLauncher for ProcessDeviceLauncher {
    fn launch(&self, args: &DeviceLaunchArgs) -> Result<(), OssieError> {
        let device = ProcessDevice::new(args, Arc::clone(&self.naming));
        self.naming
            .rebind(&naming::in_domain(&args.device_label), device.object())?;
        tracing::info!(device = %args.device_id, label = %args.device_label, "process device launched");
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(device);
        Ok(())
    }
}
