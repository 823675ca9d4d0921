//! End-to-end tests driving the registry, handler set and permission set
//! through the public API, with in-process fake services behind the client
//! traits.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use idref::{
    sample_type, AuthToken, DependencyStatus, HandlerRegistryBuilder, IdLedger, IdOccurrence,
    IdReferenceError, IdReferenceHandler, IdReferenceHandlerFactory, IdReferencePermissionHandler,
    IdReferenceType, RemappedId, Result, SampleAcls, SampleError, SampleIdHandlerFactory,
    SampleServiceClient,
};

/// A handler that remaps every ID to `<prefix><id>`.
struct PrefixHandler {
    id_type: IdReferenceType,
    prefix: &'static str,
    ledger: IdLedger<u64>,
}

impl IdReferenceHandler<u64> for PrefixHandler {
    fn id_type(&self) -> IdReferenceType {
        self.id_type.clone()
    }

    fn add_id(&mut self, associated: &u64, id: &str, _attributes: &[String]) -> Result<bool> {
        self.ledger.insert(associated, id)
    }

    fn process_ids(&mut self) -> Result<()> {
        let ids: Vec<String> = self
            .ledger
            .distinct_ids()
            .into_iter()
            .map(String::from)
            .collect();
        for id in ids {
            self.ledger.record_remap(&id, format!("{}{}", self.prefix, id));
        }
        self.ledger.mark_processed();
        Ok(())
    }

    fn remapped_id(&self, original_id: &str) -> Result<RemappedId> {
        self.ledger.remapped_id(original_id)
    }

    fn remapped_ids(&self, associated: &u64) -> Result<HashSet<RemappedId>> {
        self.ledger.remapped_ids(associated)
    }

    fn lock(&mut self) {
        self.ledger.lock();
    }
}

struct RecordingPermissionHandler {
    grants: Arc<Mutex<Vec<(Option<String>, Vec<String>)>>>,
    user: Option<String>,
}

impl IdReferencePermissionHandler for RecordingPermissionHandler {
    fn add_read_permission(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.grants.lock().push((self.user.clone(), ids.to_vec()));
        Ok(())
    }
}

struct PrefixFactory {
    id_type: IdReferenceType,
    prefix: &'static str,
    require_token: bool,
    handlers_created: AtomicUsize,
    grants: Arc<Mutex<Vec<(Option<String>, Vec<String>)>>>,
}

impl PrefixFactory {
    fn new(id_type: &str, prefix: &'static str) -> Self {
        PrefixFactory {
            id_type: IdReferenceType::new_unchecked(id_type),
            prefix,
            require_token: false,
            handlers_created: AtomicUsize::new(0),
            grants: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requiring_token(id_type: &str) -> Self {
        PrefixFactory {
            require_token: true,
            ..PrefixFactory::new(id_type, "")
        }
    }
}

impl IdReferenceHandlerFactory<u64> for PrefixFactory {
    fn id_type(&self) -> IdReferenceType {
        self.id_type.clone()
    }

    fn create_handler(&self, token: Option<&AuthToken>) -> Result<Box<dyn IdReferenceHandler<u64>>> {
        if self.require_token && token.is_none() {
            return Err(IdReferenceError::MissingArgument("userToken".to_string()));
        }
        self.handlers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(PrefixHandler {
            id_type: self.id_type.clone(),
            prefix: self.prefix,
            ledger: IdLedger::new(),
        }))
    }

    fn create_permission_handler(
        &self,
        user: Option<&str>,
    ) -> Box<dyn IdReferencePermissionHandler> {
        Box::new(RecordingPermissionHandler {
            grants: self.grants.clone(),
            user: user.map(String::from),
        })
    }

    fn dependency_status(&self) -> Vec<DependencyStatus> {
        vec![DependencyStatus::new(
            true,
            "OK",
            self.id_type.as_str(),
            "1.0",
        )]
    }
}

fn two_type_registry() -> idref::HandlerRegistry<u64> {
    HandlerRegistryBuilder::new(4)
        .with_factory(Arc::new(PrefixFactory::new("alpha", "a:")))
        .with_factory(Arc::new(PrefixFactory::new("beta", "b:")))
        .build()
}

fn t(name: &str) -> IdReferenceType {
    IdReferenceType::new_unchecked(name)
}

#[test]
fn test_collect_process_remap_round_trip() {
    let registry = two_type_registry();
    let mut set = registry
        .handler_set_factory(Some(AuthToken::new("user", "secret")))
        .create_handlers()
        .unwrap();
    assert_eq!(set.id_types(), vec![t("alpha"), t("beta")]);

    set.associate_object(1);
    set.add_id(&IdOccurrence::new(t("alpha"), "x")).unwrap();
    set.add_id(&IdOccurrence::new(t("beta"), "y")).unwrap();
    set.associate_object(2);
    set.add_id(&IdOccurrence::new(t("alpha"), "z")).unwrap();

    assert!(!set.were_ids_processed());
    set.process_ids().unwrap();
    assert!(set.were_ids_processed());

    assert_eq!(
        set.remapped_id(&t("alpha"), "x").unwrap(),
        RemappedId::new("a:x")
    );
    assert_eq!(
        set.remapped_id(&t("beta"), "y").unwrap(),
        RemappedId::new("b:y")
    );
    let obj2 = set.remapped_ids(&t("alpha"), &2).unwrap();
    assert_eq!(obj2, HashSet::from([RemappedId::new("a:z")]));
    // object 2 had no beta occurrences
    assert!(set.remapped_ids(&t("beta"), &2).unwrap().is_empty());
}

#[test]
fn test_cap_applies_across_types() {
    let registry = HandlerRegistryBuilder::new(2)
        .with_factory(Arc::new(PrefixFactory::new("alpha", "a:")))
        .with_factory(Arc::new(PrefixFactory::new("beta", "b:")))
        .build();
    let mut set = registry
        .handler_set_factory(None)
        .create_handlers()
        .unwrap();
    set.associate_object(1);
    set.add_id(&IdOccurrence::new(t("alpha"), "x")).unwrap();
    set.add_id(&IdOccurrence::new(t("beta"), "y")).unwrap();
    // a duplicate does not count against the cap
    set.add_id(&IdOccurrence::new(t("alpha"), "x")).unwrap();
    let err = set
        .add_id(&IdOccurrence::new(t("beta"), "z"))
        .unwrap_err();
    assert_eq!(err, IdReferenceError::TooManyIds { maximum: 2 });
}

#[test]
fn test_unregistered_type_occurrences_are_dropped() {
    let registry = two_type_registry();
    let mut set = registry
        .handler_set_factory(None)
        .create_handlers()
        .unwrap();
    set.associate_object(1);
    set.add_id(&IdOccurrence::new(t("gamma"), "x")).unwrap();
    set.process_ids().unwrap();
    // but remap queries for the unregistered type still fail loudly
    assert_eq!(
        set.remapped_id(&t("gamma"), "x").unwrap_err(),
        IdReferenceError::NoSuchHandler(t("gamma"))
    );
}

#[test]
fn test_add_before_associate_fails() {
    let registry = two_type_registry();
    let mut set = registry
        .handler_set_factory(None)
        .create_handlers()
        .unwrap();
    assert_eq!(
        set.add_id(&IdOccurrence::new(t("alpha"), "x")).unwrap_err(),
        IdReferenceError::NoAssociatedObject
    );
}

#[test]
fn test_token_requirement_surfaces_at_set_creation() {
    let registry = HandlerRegistryBuilder::new(4)
        .with_factory(Arc::new(PrefixFactory::requiring_token("alpha")))
        .build();
    let err = registry
        .handler_set_factory(None)
        .create_handlers()
        .unwrap_err();
    assert_eq!(
        err,
        IdReferenceError::MissingArgument("userToken".to_string())
    );
    // the same registry works once a token is supplied
    registry
        .handler_set_factory(Some(AuthToken::new("user", "secret")))
        .create_handlers()
        .unwrap();
}

#[test]
fn test_each_call_gets_fresh_handlers() {
    let factory = Arc::new(PrefixFactory::new("alpha", "a:"));
    let registry = HandlerRegistryBuilder::new(4)
        .with_factory(factory.clone())
        .build();
    let sf = registry.handler_set_factory(None);
    let mut first = sf.create_handlers().unwrap();
    first.associate_object(1);
    first.add_id(&IdOccurrence::new(t("alpha"), "x")).unwrap();
    first.process_ids().unwrap();

    // a second set from the same bound factory starts empty and unlocked
    let mut second = sf.create_handlers().unwrap();
    assert!(!second.were_ids_processed());
    second.associate_object(1);
    second.add_id(&IdOccurrence::new(t("alpha"), "x")).unwrap();
    assert_eq!(factory.handlers_created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_permission_set_routes_by_type() {
    let alpha = Arc::new(PrefixFactory::new("alpha", "a:"));
    let beta = Arc::new(PrefixFactory::new("beta", "b:"));
    let registry = HandlerRegistryBuilder::new(4)
        .with_factory(alpha.clone())
        .with_factory(beta.clone())
        .build();

    let set = registry.permission_handler_set(Some("bob"));
    set.add_read_permission(&t("alpha"), &["x".to_string(), "y".to_string()])
        .unwrap();
    assert_eq!(
        *alpha.grants.lock(),
        vec![(
            Some("bob".to_string()),
            vec!["x".to_string(), "y".to_string()]
        )]
    );
    assert!(beta.grants.lock().is_empty());

    let public = registry.permission_handler_set(None);
    public
        .add_read_permission(&t("beta"), &["z".to_string()])
        .unwrap();
    assert_eq!(*beta.grants.lock(), vec![(None, vec!["z".to_string()])]);
}

#[test]
fn test_dependency_status_covers_all_factories() {
    let registry = two_type_registry();
    let status = registry.dependency_status();
    assert_eq!(
        status,
        vec![
            DependencyStatus::new(true, "OK", "alpha", "1.0"),
            DependencyStatus::new(true, "OK", "beta", "1.0"),
        ]
    );
}

// A fake sample registry exercising a real handler factory through the whole
// framework, caller credential binding included.
struct FakeSampleService {
    samples: Mutex<Vec<(String, SampleAcls)>>,
    public_reads: Mutex<Vec<String>>,
}

impl FakeSampleService {
    fn with_sample(id: &str, owner: &str) -> Arc<Self> {
        Arc::new(FakeSampleService {
            samples: Mutex::new(vec![(
                id.to_string(),
                SampleAcls {
                    owner: owner.to_string(),
                    ..SampleAcls::default()
                },
            )]),
            public_reads: Mutex::new(Vec::new()),
        })
    }
}

impl SampleServiceClient for FakeSampleService {
    fn sample_acls(&self, id: &str) -> std::result::Result<SampleAcls, SampleError> {
        self.samples
            .lock()
            .iter()
            .find(|(sid, _)| sid == id)
            .map(|(_, acls)| acls.clone())
            .ok_or_else(|| SampleError::Remote(format!("No such sample: {id}")))
    }

    fn set_public_read(&self, id: &str) -> std::result::Result<(), SampleError> {
        self.public_reads.lock().push(id.to_string());
        Ok(())
    }

    fn add_read_acl(&self, _id: &str, _user: &str) -> std::result::Result<(), SampleError> {
        Ok(())
    }

    fn remote_version(&self) -> std::result::Result<String, SampleError> {
        Ok("0.2.1".to_string())
    }
}

#[test]
fn test_sample_factory_end_to_end() {
    let sample_id = "3a2c5678-0c4e-4d87-9e76-66b33cf0c8f4";
    let service = FakeSampleService::with_sample(sample_id, "alice");
    let client: Arc<dyn SampleServiceClient> = service.clone();
    let registry: idref::HandlerRegistry<u64> = HandlerRegistryBuilder::new(100)
        .with_factory(Arc::new(SampleIdHandlerFactory::new(Some(client))))
        .build();

    let mut set = registry
        .handler_set_factory(Some(AuthToken::new("alice", "secret")))
        .create_handlers()
        .unwrap();
    set.associate_object(1);
    set.add_id(&IdOccurrence::new(sample_type(), sample_id))
        .unwrap();
    set.process_ids().unwrap();
    assert_eq!(
        set.remapped_id(&sample_type(), sample_id).unwrap(),
        RemappedId::new(sample_id)
    );

    // post-save: make the sample publicly readable
    registry
        .permission_handler_set(None)
        .add_read_permission(&sample_type(), &[sample_id.to_string()])
        .unwrap();
    assert_eq!(*service.public_reads.lock(), vec![sample_id.to_string()]);

    let status = registry.dependency_status();
    assert_eq!(
        status,
        vec![DependencyStatus::new(true, "OK", "Sample service", "0.2.1")]
    );
}

#[test]
fn test_sample_factory_rejects_non_owner_through_framework() {
    let sample_id = "3a2c5678-0c4e-4d87-9e76-66b33cf0c8f4";
    let service = FakeSampleService::with_sample(sample_id, "bob");
    let client: Arc<dyn SampleServiceClient> = service;
    let registry: idref::HandlerRegistry<u64> = HandlerRegistryBuilder::new(100)
        .with_factory(Arc::new(SampleIdHandlerFactory::new(Some(client))))
        .build();

    let mut set = registry
        .handler_set_factory(Some(AuthToken::new("alice", "secret")))
        .create_handlers()
        .unwrap();
    set.associate_object(7);
    set.add_id(&IdOccurrence::new(sample_type(), sample_id))
        .unwrap();
    let err = set.process_ids().unwrap_err();
    match err {
        IdReferenceError::Validation {
            associated_object,
            id,
            ..
        } => {
            assert_eq!(associated_object, "7");
            assert_eq!(id, sample_id);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}
