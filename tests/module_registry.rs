use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use jobkit::config::{ConfigFile, RawConfigFile};
use jobkit::dag::{JobStatus, TaskGraph};
use jobkit::errors::{JobkitError, Result};
use jobkit::fs::{FileSystem, RealFileSystem};
use jobkit::host::Host;
use jobkit::job::{Job, JobInfo};
use jobkit::registry::{
    CatalogLoader, JobCatalog, JobDescriptor, Lifecycle, ManifestJob, ModuleLoader,
    ModuleRegistry, RegistryOptions,
};
use jobkit::task::{ServiceContainer, TaskDeclaration, TaskHandler};
use jobkit::types::JobState;
use jobkit_test_utils::modules::write_plain_library;
use jobkit_test_utils::{ModuleFixture, RecordingLogSink, init_tracing};
use tokio_util::sync::CancellationToken;

struct Greeting(String);

struct NightlyReportJob {
    info: JobInfo,
}

impl Default for NightlyReportJob {
    fn default() -> Self {
        Self {
            info: JobInfo::new("NightlyReportJob", "Nightly Report", "1.0.0"),
        }
    }
}

impl Job for NightlyReportJob {
    fn info(&self) -> &JobInfo {
        &self.info
    }

    fn task_graph(&self) -> Result<TaskGraph> {
        TaskGraph::builder()
            .task(
                TaskDeclaration::new("collect").stage(1),
                TaskHandler::with_context(|ctx| async move {
                    let recipients = ctx
                        .job()
                        .configuration()
                        .get("recipients")
                        .and_then(|v| v.as_array())
                        .map(|a| a.len())
                        .unwrap_or(0);
                    Ok(serde_json::json!(recipients))
                }),
            )
            .task(
                TaskDeclaration::new("send").stage(2).depends_on("collect"),
                TaskHandler::with_services(|services| async move {
                    let greeting = services.require::<Greeting>()?;
                    Ok(serde_json::json!(greeting.0.clone()))
                }),
            )
            .build()
    }

    fn register_services(&self, services: &ServiceContainer) -> Result<()> {
        services.register(Greeting("report sent".to_string()));
        Ok(())
    }
}

/// Loader wrapper counting how often the load path runs.
#[derive(Debug)]
struct CountingLoader {
    inner: CatalogLoader,
    loads: AtomicUsize,
}

impl ModuleLoader for CountingLoader {
    fn load(&self, descriptor: &JobDescriptor) -> Result<Arc<dyn Job>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(descriptor)
    }
}

fn catalog() -> JobCatalog {
    let mut catalog = JobCatalog::new();
    catalog.register::<NightlyReportJob>("reports::jobs::NightlyReportJob");
    catalog
}

fn counting_registry() -> (ModuleRegistry, Arc<CountingLoader>) {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let loader = Arc::new(CountingLoader {
        inner: CatalogLoader::new(Arc::clone(&fs), catalog()),
        loads: AtomicUsize::new(0),
    });
    let registry = ModuleRegistry::new(
        &RegistryOptions::default(),
        fs,
        Arc::clone(&loader) as Arc<dyn ModuleLoader>,
        Arc::new(ServiceContainer::new()),
    )
    .unwrap();
    (registry, loader)
}

fn write_reports_module(dir: &Path) {
    ModuleFixture::new("reports")
        .job_entry(ManifestJob {
            description: Some("Builds the nightly report".to_string()),
            ..ManifestJob::new("reports::jobs::NightlyReportJob")
        })
        .write_to(dir, "libreports.so");
}

#[test]
fn discovery_registers_jobs_from_a_library_with_missing_dependencies() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_reports_module(dir.path());
    // Its native dependency is absent and its job is not in the catalog:
    // discovery reads the manifest only, so the job is still listed.
    ModuleFixture::new("helpers")
        .requires("libmissing_native.so")
        .job("helpers::OrphanJob")
        .write_to(dir.path(), "nested/libhelpers.so");
    write_plain_library(dir.path(), "libtokio-rt.so");

    let (registry, loader) = counting_registry();
    let registered = registry.discover(dir.path()).unwrap();

    assert_eq!(registered, 2);
    let jobs = registry.available_jobs();
    assert_eq!(jobs.len(), 2);
    let report = jobs
        .iter()
        .find(|d| d.job_type == "NightlyReportJob")
        .expect("report descriptor");
    assert_eq!(report.display_name, "Nightly Report");
    assert_eq!(report.description, "Builds the nightly report");
    assert_eq!(report.version, "1.0.0");
    assert_eq!(report.module_name, "reports");
    assert_eq!(report.fingerprint.len(), 64);
    assert!(registry.has_job("NightlyReportJob"));

    let orphan = registry.descriptor("OrphanJob").expect("orphan descriptor");
    assert_eq!(orphan.module_name, "helpers");
    assert_eq!(orphan.requires, vec!["libmissing_native.so".to_string()]);
    assert_eq!(registry.lifecycle("OrphanJob"), Lifecycle::Discovered);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[test]
fn get_job_returns_the_cached_instance_and_loads_once() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_reports_module(dir.path());

    let (registry, loader) = counting_registry();
    registry.discover(dir.path()).unwrap();
    assert_eq!(registry.lifecycle("NightlyReportJob"), Lifecycle::Discovered);

    let first = registry.get_job("NightlyReportJob").unwrap();
    let second = registry.get_job("NightlyReportJob").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(registry.lifecycle("NightlyReportJob"), Lifecycle::Loaded);
    assert_eq!(first.info().state(), JobState::Active);
    assert!(registry.services().contains::<Greeting>());
}

#[test]
fn concurrent_get_job_calls_share_one_load() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_reports_module(dir.path());

    let (registry, loader) = counting_registry();
    registry.discover(dir.path()).unwrap();
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.get_job("NightlyReportJob").map(|_| ()).is_ok())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_requirement_surfaces_on_load_not_on_discovery() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    ModuleFixture::new("reports")
        .requires("libreport_native.so")
        .job("reports::jobs::NightlyReportJob")
        .write_to(dir.path(), "libreports.so");

    let (registry, _) = counting_registry();
    assert_eq!(registry.discover(dir.path()).unwrap(), 1);

    match registry.get_job("NightlyReportJob") {
        Err(JobkitError::LoadError(msg)) => assert!(msg.contains("libreport_native.so")),
        Err(other) => panic!("expected LoadError, got {other:?}"),
        Ok(_) => panic!("load should fail without its requirement"),
    }
    assert_eq!(registry.lifecycle("NightlyReportJob"), Lifecycle::Discovered);
}

#[test]
fn exclude_globs_skip_candidates() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_reports_module(&dir.path().join("deps"));

    let options = RegistryOptions {
        exclude: vec!["deps/**".to_string()],
        ..RegistryOptions::default()
    };
    let registry = ModuleRegistry::with_catalog(&options, catalog()).unwrap();
    assert_eq!(registry.discover(dir.path()).unwrap(), 0);
    assert!(registry.available_jobs().is_empty());
}

#[tokio::test]
async fn host_discovers_loads_configures_and_runs() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_reports_module(&dir.path().join("modules"));

    let raw: RawConfigFile = toml::from_str(&format!(
        r#"
        [registry]
        modules_dir = {:?}

        [job.NightlyReportJob]
        recipients = ["ops@example.com", "dev@example.com"]
        "#,
        dir.path().join("modules")
    ))
    .unwrap();
    let config = ConfigFile::try_from(raw).unwrap();
    let sink = RecordingLogSink::new();
    let host = Host::from_config(config, catalog())
        .unwrap()
        .with_log_sink(Arc::new(sink.clone()));

    let result = host
        .run("NightlyReportJob", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, JobStatus::Success);
    assert_eq!(
        result.task("collect").and_then(|r| r.output_value("result")),
        Some(&serde_json::json!(2))
    );
    assert_eq!(
        result.task("send").and_then(|r| r.output_value("result")),
        Some(&serde_json::json!("report sent"))
    );

    let job = host.registry().get_job("NightlyReportJob").unwrap();
    assert_eq!(job.info().history().len(), 1);
    assert_eq!(job.info().state(), JobState::Active);

    assert!(matches!(
        host.run("Unknown", &CancellationToken::new()).await,
        Err(JobkitError::JobNotFound(t)) if t == "Unknown"
    ));
}
