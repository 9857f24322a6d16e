mod dummy;

use std::path::PathBuf;
use std::sync::Arc;

use devmem_common::stream_id::StreamId;
use devmem_runtime::{
    config::{memory::MemoryLogLevel, GlobalConfig},
    device::{Device, DeviceSelector},
    import::{ImportError, NativeHandle, SharedHandle},
    memory_management::{LedgerError, PolicyError},
    AllocationType, DataType, Engine, EngineError, EngineFactory, Layout,
};
use dummy::*;
use serial_test::serial;

fn default_config() -> Arc<GlobalConfig> {
    Arc::new(GlobalConfig::default())
}

fn usm_disabled_config() -> Arc<GlobalConfig> {
    let mut config = GlobalConfig::default();
    config.memory.disable_usm = true;
    Arc::new(config)
}

fn engine_with(device: Device, config: Arc<GlobalConfig>) -> Engine<DummyBackend> {
    EngineFactory::from_device(device, DummyBackend::default(), config)
}

fn engine() -> Engine<DummyBackend> {
    engine_with(full_device("0"), default_config())
}

#[test_log::test]
fn factory_fails_without_devices() {
    let result = EngineFactory::create_with_config(
        &DummyDeviceQuery::empty(),
        DummyBackend::default(),
        &DeviceSelector::Default,
        default_config(),
    );

    match result {
        Err(EngineError::NoDevices {
            backend, runtime, ..
        }) => {
            assert_eq!(backend, "dummy");
            assert_eq!(runtime, "dummy-runtime");
        }
        other => panic!("Expected a missing device error, got {other:?}"),
    }
}

#[test_log::test]
fn factory_selects_first_device_by_default() {
    let query = DummyDeviceQuery::new(vec![full_device("1"), full_device("0")]);

    let engine = EngineFactory::create_with_config(
        &query,
        DummyBackend::default(),
        &DeviceSelector::Default,
        default_config(),
    )
    .unwrap();

    assert_eq!(engine.device().id(), "0");
}

#[test_log::test]
fn factory_selects_device_by_id() {
    let query = DummyDeviceQuery::new(vec![full_device("0"), full_device("1")]);

    let engine = EngineFactory::create_with_config(
        &query,
        DummyBackend::default(),
        &DeviceSelector::Id("1".into()),
        default_config(),
    )
    .unwrap();

    assert_eq!(engine.device().id(), "1");
    assert_eq!(engine.device().name(), "Dummy GPU 1");
}

#[test_log::test]
fn factory_falls_back_when_id_is_unknown() {
    let query = DummyDeviceQuery::new(vec![full_device("0")]);

    let engine = EngineFactory::create_with_config(
        &query,
        DummyBackend::default(),
        &DeviceSelector::Id("7".into()),
        default_config(),
    )
    .unwrap();

    assert_eq!(engine.device().id(), "0");
}

#[test_log::test]
#[serial]
fn factory_uses_global_config() {
    let query = DummyDeviceQuery::new(vec![full_device("0")]);

    let engine =
        EngineFactory::create(&query, DummyBackend::default(), &DeviceSelector::Default).unwrap();

    assert_eq!(
        engine.use_unified_shared_memory(),
        !GlobalConfig::get().memory.disable_usm
    );
}

#[test_log::test]
fn allocate_prefers_unified_device() {
    let engine = engine();
    let layout = Layout::buffer([16, 16], DataType::F32);

    let memory = engine.allocate(&layout, false).unwrap();

    assert_eq!(
        memory.allocation_type(),
        Some(AllocationType::UnifiedDevice)
    );
    assert!(memory.is_owned());
    assert!(!memory.is_lockable());
    assert_eq!(engine.used_memory(AllocationType::UnifiedDevice), 1024);
}

#[test_log::test]
fn allocate_lockable_prefers_unified_shared() {
    let engine = engine();
    let layout = Layout::buffer([256], DataType::U8);

    let memory = engine.allocate_lockable(&layout).unwrap();

    assert_eq!(
        memory.allocation_type(),
        Some(AllocationType::UnifiedShared)
    );
    assert!(memory.is_lockable());
    assert!(!memory.resource().unwrap().zeroed);
}

#[test_log::test]
fn allocate_falls_back_to_unified_host() {
    let device = dummy_device(
        "0",
        "Integrated GPU",
        &[AllocationType::UnifiedHost, AllocationType::PlainBuffer],
    );
    let engine = engine_with(device, default_config());
    let layout = Layout::buffer([8], DataType::F64);

    let general = engine.allocate(&layout, false).unwrap();
    let lockable = engine.allocate_lockable(&layout).unwrap();

    assert_eq!(general.allocation_type(), Some(AllocationType::UnifiedHost));
    assert_eq!(lockable.allocation_type(), Some(AllocationType::UnifiedHost));
    assert_eq!(engine.used_memory(AllocationType::UnifiedHost), 128);
}

#[test_log::test]
fn allocate_fails_without_usable_unified_tier() {
    let device = dummy_device(
        "0",
        "Shared only GPU",
        &[AllocationType::UnifiedShared, AllocationType::PlainBuffer],
    );
    let engine = engine_with(device, default_config());
    let layout = Layout::buffer([8], DataType::F32);

    let result = engine.allocate(&layout, false);

    assert!(matches!(
        result,
        Err(EngineError::Policy(PolicyError::NoUsableUnifiedTier { .. }))
    ));
    assert!(engine.backend().allocated().is_empty());
    assert_eq!(engine.memory_statistics().values().sum::<u64>(), 0);
}

#[test_log::test]
fn images_use_the_default_type() {
    let engine = engine();
    let layout = Layout::image([64, 64, 4], DataType::U8);

    let general = engine.allocate(&layout, false).unwrap();
    let lockable = engine.allocate_lockable(&layout).unwrap();

    assert_eq!(general.allocation_type(), Some(AllocationType::PlainBuffer));
    assert_eq!(lockable.allocation_type(), Some(AllocationType::PlainBuffer));
}

#[test_log::test]
fn disabled_usm_uses_the_default_type() {
    let engine = engine_with(full_device("0"), usm_disabled_config());
    let layout = Layout::buffer([32], DataType::I32);

    assert!(!engine.use_unified_shared_memory());
    for ty in [
        AllocationType::UnifiedDevice,
        AllocationType::UnifiedHost,
        AllocationType::UnifiedShared,
    ] {
        assert!(!engine.supports_allocation(ty));
    }

    let general = engine.allocate(&layout, false).unwrap();
    let lockable = engine.allocate_lockable(&layout).unwrap();

    assert_eq!(general.allocation_type(), Some(AllocationType::PlainBuffer));
    assert_eq!(lockable.allocation_type(), Some(AllocationType::PlainBuffer));
}

#[test_log::test]
fn unified_shared_is_excluded_from_the_general_path() {
    let engine = engine();

    assert!(engine.supports_allocation(AllocationType::UnifiedDevice));
    assert!(engine.supports_allocation(AllocationType::UnifiedHost));
    assert!(!engine.supports_allocation(AllocationType::UnifiedShared));
}

#[test_log::test]
fn reset_is_forwarded_to_the_backend() {
    let engine = engine();
    let layout = Layout::buffer([4], DataType::F16);

    let zeroed = engine.allocate(&layout, true).unwrap();
    let dirty = engine.allocate(&layout, false).unwrap();

    assert!(zeroed.resource().unwrap().zeroed);
    assert!(!dirty.resource().unwrap().zeroed);
}

#[test_log::test]
fn allocate_with_type_rejects_unsupported_types() {
    let device = dummy_device("0", "Discrete GPU", &[AllocationType::PlainBuffer]);
    let engine = engine_with(device, default_config());
    let layout = Layout::buffer([4], DataType::F32);

    let result = engine.allocate_with_type(&layout, AllocationType::UnifiedShared, false);

    assert!(matches!(
        result,
        Err(EngineError::UnsupportedAllocation {
            allocation_type: AllocationType::UnifiedShared,
            ..
        })
    ));
    assert!(engine.backend().allocated().is_empty());
}

#[test_log::test]
fn allocate_with_type_accepts_unified_shared() {
    let engine = engine();
    let layout = Layout::buffer([4], DataType::F32);

    let memory = engine
        .allocate_with_type(&layout, AllocationType::UnifiedShared, true)
        .unwrap();

    assert_eq!(
        memory.allocation_type(),
        Some(AllocationType::UnifiedShared)
    );
    assert_eq!(engine.used_memory(AllocationType::UnifiedShared), 16);
}

#[test_log::test]
fn free_releases_owned_memory() {
    let engine = engine();
    let layout = Layout::buffer([100], DataType::U8);

    let first = engine.allocate(&layout, false).unwrap();
    let second = engine.allocate(&layout, false).unwrap();
    let first_id = first.resource().unwrap().id;

    engine.free(first).unwrap();

    assert_eq!(engine.used_memory(AllocationType::UnifiedDevice), 100);
    assert_eq!(engine.peak_memory(AllocationType::UnifiedDevice), 200);
    assert_eq!(engine.backend().deallocated(), vec![first_id]);

    engine.free(second).unwrap();

    assert_eq!(engine.used_memory(AllocationType::UnifiedDevice), 0);
    assert_eq!(engine.peak_memory(AllocationType::UnifiedDevice), 200);
    assert_eq!(engine.peak_memory_total(), 200);
    assert_eq!(engine.backend().in_use(), 0);
}

#[test_log::test]
fn backend_failure_is_not_accounted() {
    let engine = EngineFactory::from_device(
        full_device("0"),
        DummyBackend::with_capacity(64),
        default_config(),
    );

    let result = engine.allocate(&Layout::buffer([128], DataType::U8), false);

    assert!(matches!(result, Err(EngineError::Backend(_))));
    assert_eq!(engine.used_memory(AllocationType::UnifiedDevice), 0);
    assert_eq!(engine.peak_memory(AllocationType::UnifiedDevice), 0);
}

#[test_log::test]
fn imported_memory_is_never_released() {
    let engine = engine();
    let layout = Layout::buffer([64], DataType::F32);
    let handle = NativeHandle::new(0xdead_b000).unwrap();

    let memory = engine.share_buffer(&layout, handle).unwrap();

    assert!(!memory.is_owned());
    assert_eq!(memory.allocation_type(), None);
    assert_eq!(engine.imported_memory(), 256);
    assert_eq!(engine.peak_memory_total(), 0);

    engine.free(memory).unwrap();

    assert_eq!(engine.imported_memory(), 0);
    assert!(engine.backend().allocated().is_empty());
    assert!(engine.backend().deallocated().is_empty());
}

#[test_log::test]
fn surface_planes_are_imported() {
    let engine = engine();
    let surface = NativeHandle::new(0x1000).unwrap();
    let luma = Layout::image([720, 1280, 1], DataType::U8);
    let chroma = Layout::image([360, 640, 2], DataType::U8);

    let first = engine.share_surface(&luma, surface, 0).unwrap();
    let second = engine.share_surface(&chroma, surface, 1).unwrap();

    assert_eq!(engine.imported_memory(), 720 * 1280 + 360 * 640 * 2);

    engine.free(first).unwrap();
    engine.free(second).unwrap();

    assert_eq!(engine.imported_memory(), 0);
}

#[test_log::test]
fn invalid_imports_are_rejected() {
    let engine = engine();
    let handle = NativeHandle::new(0x1000).unwrap();

    assert_eq!(
        NativeHandle::new(0),
        Err(ImportError::NullHandle { kind: "native" })
    );

    let mismatch = engine.share_image(&Layout::buffer([16], DataType::F32), handle);
    assert!(matches!(
        mismatch,
        Err(EngineError::Import(ImportError::LayoutMismatch { .. }))
    ));

    let plane = engine.import(
        &Layout::image([16, 16, 1], DataType::U8),
        SharedHandle::Surface {
            surface: handle,
            plane: 5,
        },
    );
    assert!(matches!(
        plane,
        Err(EngineError::Import(ImportError::InvalidPlane { plane: 5 }))
    ));

    assert_eq!(engine.imported_memory(), 0);
}

#[test_log::test]
fn attached_memory_is_not_accounted() {
    let engine = engine();
    let mut scratch = vec![0u8; 64];
    let layout = Layout::buffer([64], DataType::U8);

    let memory = engine.attach(&layout, scratch.as_mut_ptr()).unwrap();

    assert!(!memory.is_owned());
    assert_eq!(engine.imported_memory(), 0);

    engine.free(memory).unwrap();

    assert!(engine.backend().deallocated().is_empty());
    assert_eq!(scratch.len(), 64);
}

#[test_log::test]
fn attach_rejects_null_pointers() {
    let engine = engine();
    let layout = Layout::buffer([64], DataType::U8);

    let result = engine.attach(&layout, std::ptr::null_mut::<u8>());

    assert!(matches!(
        result,
        Err(EngineError::Import(ImportError::NullHandle { .. }))
    ));
}

#[test_log::test]
fn memory_ids_are_unique() {
    let engine = engine();
    let layout = Layout::buffer([4], DataType::U8);

    let first = engine.allocate(&layout, false).unwrap();
    let second = engine.allocate(&layout, false).unwrap();

    assert_ne!(first.id(), second.id());
}

#[test_log::test]
fn max_memory_covers_the_device() {
    let engine = engine();

    assert!(engine.max_memory_size() >= engine.device().total_memory());
    assert_eq!(engine.max_memory_size(), engine.max_memory_size());
}

#[test_log::test]
fn ledger_statistics_are_reported_per_type() {
    let engine = engine();

    let unified = engine
        .allocate(&Layout::buffer([10], DataType::U8), false)
        .unwrap();
    let image = engine
        .allocate(&Layout::image([2, 2, 4], DataType::U8), false)
        .unwrap();

    let statistics = engine.memory_statistics();
    assert_eq!(statistics.get("unified_device"), Some(&10));
    assert_eq!(statistics.get("plain_buffer"), Some(&16));

    engine.free(unified).unwrap();
    engine.free(image).unwrap();

    assert!(engine.memory_statistics().values().all(|bytes| *bytes == 0));
    assert_eq!(engine.peak_memory_total(), 26);
}

#[test_log::test]
fn concurrent_allocations_are_conserved() {
    const THREADS: usize = 8;
    const ITERATIONS: usize = 200;

    let engine = engine();
    let layout = Layout::buffer([32], DataType::U8);

    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..ITERATIONS {
                    let first = engine.allocate(&layout, false).unwrap();
                    let second = engine.allocate_lockable(&layout).unwrap();
                    engine.free(first).unwrap();
                    engine.free(second).unwrap();
                }
            });
        }
    });

    assert_eq!(engine.used_memory(AllocationType::UnifiedDevice), 0);
    assert_eq!(engine.used_memory(AllocationType::UnifiedShared), 0);
    assert_eq!(engine.backend().in_use(), 0);

    let peak = engine.peak_memory(AllocationType::UnifiedDevice);
    assert!(peak >= 32);
    assert!(peak <= (THREADS * 32) as u64);
    assert_eq!(
        engine.backend().deallocated().len(),
        THREADS * ITERATIONS * 2
    );
}

fn logging_config(level: MemoryLogLevel, file: &PathBuf) -> Arc<GlobalConfig> {
    let mut config = GlobalConfig::default();
    config.memory.logger.level = level;
    config.memory.logger.file = Some(file.clone());
    config.memory.logger.append = false;
    Arc::new(config)
}

fn log_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("devmem-{name}-{}.log", std::process::id()))
}

fn read_log(path: &PathBuf) -> Vec<String> {
    let content = std::fs::read_to_string(path).unwrap();
    std::fs::remove_file(path).ok();
    content.lines().map(String::from).collect()
}

#[test_log::test]
fn full_memory_log_dumps_statistics_after_each_event() {
    let path = log_path("full");
    let engine = engine_with(full_device("0"), logging_config(MemoryLogLevel::Full, &path));

    let allocated = engine
        .allocate(&Layout::buffer([16, 16], DataType::F32), false)
        .unwrap();
    let imported = engine
        .share_buffer(
            &Layout::buffer([64], DataType::F32),
            NativeHandle::new(0x4000).unwrap(),
        )
        .unwrap();

    let stream = StreamId::current();
    assert_eq!(allocated.stream(), stream);
    let (allocated_id, imported_id) = (allocated.id(), imported.id());

    engine.free(imported).unwrap();
    engine.free(allocated).unwrap();
    drop(engine);

    let expected = vec![
        format!("[{stream}] allocate {allocated_id} unified_device 1.00 KiB ([16, 16])"),
        "  - unified_device   1.00 KiB".to_string(),
        format!("[{stream}] import   {imported_id} external 256 B ([64])"),
        "  - imported         256 B".to_string(),
        "  - unified_device   1.00 KiB".to_string(),
        format!("[{stream}] free     {imported_id} external 256 B ([64])"),
        "  - imported         0 B".to_string(),
        "  - unified_device   1.00 KiB".to_string(),
        format!("[{stream}] free     {allocated_id} unified_device 1.00 KiB ([16, 16])"),
        "  - imported         0 B".to_string(),
        "  - unified_device   0 B".to_string(),
    ];
    assert_eq!(read_log(&path), expected);
}

#[test_log::test]
fn basic_memory_log_names_the_freeing_stream() {
    let path = log_path("basic");
    let engine = engine_with(full_device("0"), logging_config(MemoryLogLevel::Basic, &path));

    let memory = engine
        .allocate(&Layout::image([4, 4], DataType::U8), false)
        .unwrap();
    let id = memory.id();

    let freeing = std::thread::scope(|scope| {
        scope
            .spawn(|| {
                engine.free(memory).unwrap();
                StreamId::current()
            })
            .join()
            .unwrap()
    });
    drop(engine);

    let stream = StreamId::current();
    assert_ne!(freeing, stream);
    assert_eq!(
        read_log(&path),
        vec![
            format!("[{stream}] allocate {id} plain_buffer 16 B ([4, 4])"),
            format!("[{stream}] free     {id} plain_buffer 16 B ([4, 4]) from {freeing}"),
        ]
    );
}

#[test_log::test]
fn oversized_layouts_are_rejected() {
    let engine = engine();
    let layout = Layout::buffer([usize::MAX, 2], DataType::U8);
    let handle = NativeHandle::new(0x1000).unwrap();

    let imported = engine.share_buffer(&layout, handle);
    let allocated = engine.allocate(&layout, false);

    assert!(matches!(
        imported,
        Err(EngineError::Import(ImportError::LayoutTooLarge { kind: "buffer", .. }))
    ));
    assert!(matches!(
        allocated,
        Err(EngineError::LayoutTooLarge { .. })
    ));
    assert!(engine.backend().allocated().is_empty());
    assert_eq!(engine.imported_memory(), 0);
}

#[cfg(target_pointer_width = "64")]
#[test_log::test]
fn imported_memory_overflow_is_recoverable() {
    let engine = engine();
    let layout = Layout::buffer([usize::MAX / 6], DataType::F32);
    let handle = NativeHandle::new(0x1000).unwrap();

    let first = engine.share_buffer(&layout, handle).unwrap();
    let second = engine.share_buffer(&layout, handle);

    assert!(matches!(
        second,
        Err(EngineError::Ledger(LedgerError::Overflow { .. }))
    ));
    assert_eq!(engine.imported_memory(), first.size());

    engine.free(first).unwrap();
    assert_eq!(engine.imported_memory(), 0);
}

#[test_log::test]
fn memory_can_only_be_freed_by_its_engine() {
    let owner = engine();
    let other = engine();
    let layout = Layout::buffer([8], DataType::U8);

    let kept = other.allocate(&layout, false).unwrap();
    let memory = owner.allocate(&layout, false).unwrap();
    let memory_id = memory.id();

    let result = other.free(memory);

    match result {
        Err(EngineError::ForeignMemory {
            memory,
            owner: owner_id,
            engine,
            ..
        }) => {
            assert_eq!(memory, memory_id);
            assert_eq!(owner_id, owner.id());
            assert_eq!(engine, other.id());
        }
        unexpected => panic!("Expected a foreign memory error, got {unexpected:?}"),
    }
    assert_eq!(other.used_memory(AllocationType::UnifiedDevice), 8);
    assert!(other.backend().deallocated().is_empty());
    assert_eq!(owner.used_memory(AllocationType::UnifiedDevice), 8);

    other.free(kept).unwrap();
}

