//! Shared state of one domain, handed to every orchestration service.

use std::sync::{Arc, PoisonError, RwLock};

use ossie_domain::event::{Event, EventType, SourceCategory};
use ossie_domain::id::{ApplicationId, FactoryId};

use crate::ports::{EventPublisher, FileSystem, NamingService};
use crate::retry::PollPolicy;
use crate::services::application::Application;
use crate::services::application_factory::ApplicationFactory;
use crate::services::file_manager::FileManager;
use crate::services::profiles::ProfileLoader;
use crate::services::registry::DomainRegistry;

pub struct DomainContext<P> {
    pub identifier: String,
    pub name: String,
    pub naming: Arc<dyn NamingService>,
    pub file_manager: Arc<FileManager>,
    pub profiles: ProfileLoader,
    pub registry: DomainRegistry,
    pub poll: PollPolicy,
    publisher: P,
    applications: RwLock<Vec<Arc<Application<P>>>>,
    factories: RwLock<Vec<Arc<ApplicationFactory<P>>>>,
}

impl<P: EventPublisher + Send + Sync + 'static> DomainContext<P> {
    /// Create the context of a domain whose root file system is `root`.
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        naming: Arc<dyn NamingService>,
        root: Arc<dyn FileSystem>,
        publisher: P,
    ) -> Self {
        let file_manager = Arc::new(FileManager::new(root));
        let profiles = ProfileLoader::new(Arc::clone(&file_manager) as Arc<dyn FileSystem>);
        Self {
            identifier: identifier.into(),
            name: name.into(),
            naming,
            file_manager,
            profiles,
            registry: DomainRegistry::new(),
            poll: PollPolicy::default(),
            publisher,
            applications: RwLock::new(Vec::new()),
            factories: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Publish a domain management event. Delivery failures are logged and
    /// never fail the operation that produced the event.
    pub async fn emit(
        &self,
        event_type: EventType,
        source_id: &str,
        source_name: &str,
        category: SourceCategory,
    ) {
        let event = Event::new(
            event_type,
            self.identifier.clone(),
            source_id,
            source_name,
            category,
        );
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(error = %err, source_id, "failed to publish domain event");
        }
    }

    #[must_use]
    pub fn applications(&self) -> Vec<Arc<Application<P>>> {
        self.applications
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn add_application(&self, application: Arc<Application<P>>) {
        self.applications
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(application);
    }

    pub(crate) fn remove_application(&self, id: &ApplicationId) -> bool {
        let mut apps = self.applications.write().unwrap_or_else(PoisonError::into_inner);
        let before = apps.len();
        apps.retain(|a| a.identifier() != id);
        apps.len() != before
    }

    #[must_use]
    pub fn factories(&self) -> Vec<Arc<ApplicationFactory<P>>> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn factory(&self, id: &FactoryId) -> Option<Arc<ApplicationFactory<P>>> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|f| f.identifier() == id)
            .cloned()
    }

    /// Returns `false` when a factory with the same identifier is installed.
    pub(crate) fn add_factory(&self, factory: Arc<ApplicationFactory<P>>) -> bool {
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.iter().any(|f| f.identifier() == factory.identifier()) {
            return false;
        }
        factories.push(factory);
        true
    }

    pub(crate) fn remove_factory(&self, id: &FactoryId) -> Option<Arc<ApplicationFactory<P>>> {
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        let idx = factories.iter().position(|f| f.identifier() == id)?;
        Some(factories.remove(idx))
    }
}
