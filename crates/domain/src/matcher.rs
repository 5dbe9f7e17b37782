//! Implementation matching.
//!
//! An explicit dependency on a device implementation always wins over
//! OS/processor compatibility; absence of both is a failed match, never a
//! silent fallback.

use crate::descriptor::Implementation;

/// Select the component implementation to deploy onto a device.
///
/// Pass one scans every device implementation for a component
/// implementation that depends on it. Pass two, only when pass one found
/// nothing, scans for OS name+version equality and a common processor.
#[must_use]
pub fn match_implementation<'a>(
    component: &'a [Implementation],
    devices: &[Implementation],
) -> Option<&'a Implementation> {
    devices
        .iter()
        .find_map(|device| component.iter().find(|imp| imp.depends_on(&device.id)))
        .or_else(|| {
            devices.iter().find_map(|device| {
                component
                    .iter()
                    .find(|imp| imp.is_compatible_with(device))
            })
        })
}

/// Select the device implementation a device manager launches on its node.
///
/// A package whose every implementation declares an OS is a
/// general-purpose processor and matches the node by OS and processor;
/// any other device matches through the node's dependency references.
#[must_use]
pub fn match_node_implementation<'a>(
    device: &'a [Implementation],
    node: &Implementation,
) -> Option<&'a Implementation> {
    let general_purpose = !device.is_empty() && device.iter().all(Implementation::declares_os);
    if general_purpose {
        device.iter().find(|imp| imp.is_compatible_with(node))
    } else {
        device.iter().find(|imp| node.depends_on(&imp.id))
    }
}
