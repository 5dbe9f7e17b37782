//! Descriptor loading through a [`FileSystem`].

use std::sync::Arc;

use serde::de::DeserializeOwned;

use ossie_domain::descriptor::{
    self, ComponentDescriptor, DeviceConfiguration, Implementation, PropertyFile, SoftPkg,
    SoftwareAssembly,
};
use ossie_domain::error::{OssieError, ProfileError};

use crate::ports::FileSystem;

/// Reads and validates descriptors. Every failure is reported as
/// [`OssieError::InvalidProfile`].
#[derive(Clone)]
pub struct ProfileLoader {
    fs: Arc<dyn FileSystem>,
}

impl ProfileLoader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    fn load<T: DeserializeOwned>(&self, path: &str, suffix: &str) -> Result<T, OssieError> {
        if !path.ends_with(suffix) {
            tracing::warn!(path, expected = suffix, "unexpected descriptor file extension");
        }
        if !self.fs.exists(path)? {
            return Err(ProfileError::Missing(path.to_string()).into());
        }
        let bytes = self.fs.read(path)?;
        serde_json::from_slice(&bytes).map_err(|err| {
            ProfileError::Malformed {
                path: path.to_string(),
                reason: err.to_string(),
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when the file is missing,
    /// malformed or incomplete.
    pub fn software_package(&self, path: &str) -> Result<SoftPkg, OssieError> {
        let spd: SoftPkg = self.load(path, descriptor::SPD_SUFFIX)?;
        spd.validate(path)?;
        Ok(spd)
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when the file is missing,
    /// malformed or incomplete.
    pub fn property_file(&self, path: &str) -> Result<PropertyFile, OssieError> {
        let prf: PropertyFile = self.load(path, descriptor::PRF_SUFFIX)?;
        prf.validate(path)?;
        Ok(prf)
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when the file is missing or
    /// malformed.
    pub fn component_descriptor(&self, path: &str) -> Result<ComponentDescriptor, OssieError> {
        self.load(path, descriptor::SCD_SUFFIX)
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when the file is missing,
    /// malformed or incomplete.
    pub fn software_assembly(&self, path: &str) -> Result<SoftwareAssembly, OssieError> {
        let sad: SoftwareAssembly = self.load(path, descriptor::SAD_SUFFIX)?;
        sad.validate(path)?;
        Ok(sad)
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when the file is missing,
    /// malformed or incomplete.
    pub fn device_configuration(&self, path: &str) -> Result<DeviceConfiguration, OssieError> {
        let dcd: DeviceConfiguration = self.load(path, descriptor::DCD_SUFFIX)?;
        dcd.validate(path)?;
        Ok(dcd)
    }

    /// Generic then implementation-specific property files of a package.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when a referenced file is
    /// missing or malformed.
    pub fn package_properties(
        &self,
        spd_path: &str,
        spd: &SoftPkg,
        implementation: &Implementation,
    ) -> Result<Vec<PropertyFile>, OssieError> {
        spd.property_file
            .iter()
            .chain(implementation.property_file.iter())
            .map(|file| self.property_file(&descriptor::resolve_relative(spd_path, file)))
            .collect()
    }

    /// SCD of a package, if it declares one.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when the declared file is
    /// missing or malformed.
    pub fn package_descriptor(
        &self,
        spd_path: &str,
        spd: &SoftPkg,
    ) -> Result<Option<ComponentDescriptor>, OssieError> {
        spd.descriptor
            .as_deref()
            .map(|file| self.component_descriptor(&descriptor::resolve_relative(spd_path, file)))
            .transpose()
    }

    /// Load a package together with every file it references.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] for the first invalid file.
    pub fn validate_package(&self, spd_path: &str) -> Result<SoftPkg, OssieError> {
        let spd = self.software_package(spd_path)?;
        self.package_descriptor(spd_path, &spd)?;
        for implementation in &spd.implementations {
            self.package_properties(spd_path, &spd, implementation)?;
        }
        Ok(spd)
    }
}
