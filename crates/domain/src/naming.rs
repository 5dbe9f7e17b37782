//! Naming hierarchy conventions.

/// Root naming context of a domain.
pub const DOMAIN_ROOT: &str = "DomainName1";

/// Separator between naming path components.
pub const SEPARATOR: char = '/';

/// `<context>/<name>`.
#[must_use]
pub fn join(context: &str, name: &str) -> String {
    format!("{context}{SEPARATOR}{name}")
}

/// `DomainName1/<name>`.
#[must_use]
pub fn in_domain(name: &str) -> String {
    join(DOMAIN_ROOT, name)
}

/// Drop a leading `DomainName1/` from descriptor-supplied names.
#[must_use]
pub fn strip_domain_prefix(name: &str) -> &str {
    name.strip_prefix(DOMAIN_ROOT)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .unwrap_or(name)
}

/// Naming context of the `n`-th instance of an application.
#[must_use]
pub fn application_context(application: &str, n: u32) -> String {
    in_domain(&format!("{application}_{n}"))
}

/// Split a path into its non-empty components.
#[must_use]
pub fn components(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).filter(|c| !c.is_empty()).collect()
}

/// Mount point of a device manager's file system.
#[must_use]
pub fn device_manager_mount(label: &str) -> String {
    format!("{SEPARATOR}{label}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_strip_legacy_domain_prefix_only_once() {
        assert_eq!(strip_domain_prefix("DomainName1/Amp"), "Amp");
        assert_eq!(strip_domain_prefix("Amp"), "Amp");
        assert_eq!(strip_domain_prefix("DomainName1Amp"), "DomainName1Amp");
        assert_eq!(
            strip_domain_prefix("DomainName1/DomainName1/Amp"),
            "DomainName1/Amp"
        );
    }

    #[test]
    fn should_suffix_application_context_with_instance_number() {
        assert_eq!(application_context("Wave", 2), "DomainName1/Wave_2");
    }

    #[test]
    fn should_ignore_empty_path_components() {
        assert_eq!(components("/DomainName1//Wave_1/"), vec!["DomainName1", "Wave_1"]);
    }
}
