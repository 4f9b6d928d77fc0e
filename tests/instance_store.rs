//! Slot isolation and lifetime of the double-buffered blade store.

use std::sync::Arc;

use meadow::gpu::{GpuBackend, HostBackend};
use meadow::{Blade, GrassError, InstanceStore};

fn blade(x: f32) -> Blade {
    Blade::new([x, 0.0, 0.0], [0.3, 1.0], 0.5)
}

fn sentinel(tag: f32) -> Blade {
    Blade::new([tag; 3], [tag; 2], tag)
}

#[test]
fn writes_never_bleed_into_the_settled_slot() {
    let backend = Arc::new(HostBackend::new());
    let initial: Vec<Blade> = (0..8).map(|i| blade(i as f32)).collect();
    let store = InstanceStore::new(backend, "blades", &initial).unwrap();

    store.set_write_target(0);
    store.write(0, &vec![sentinel(-1.0); 8]).unwrap();
    assert_eq!(store.read(1).unwrap(), initial);

    store.set_write_target(1);
    store.write(2, &[sentinel(-2.0)]).unwrap();
    let slot0 = store.read(0).unwrap();
    let slot1 = store.read(1).unwrap();
    assert!(slot0.iter().all(|b| *b == sentinel(-1.0)));
    assert_eq!(slot1[2], sentinel(-2.0));
    assert_eq!(slot1[1], initial[1]);
    assert_eq!(store.read_settled().unwrap(), slot0);
}

#[test]
fn both_slots_bind_distinct_buffers() {
    let backend = Arc::new(HostBackend::new());
    let store = InstanceStore::new(backend, "blades", &[blade(1.0)]).unwrap();
    let a = store.buffer(0).unwrap();
    let b = store.buffer(1).unwrap();
    assert!(!std::ptr::eq(a, b));
    assert_eq!(a.label, "blades[0]");
    assert_eq!(b.label, "blades[1]");
}

#[test]
fn dispose_is_idempotent_and_final() {
    let backend = Arc::new(HostBackend::new());
    let mut store = InstanceStore::new(backend.clone(), "blades", &[blade(1.0); 4]).unwrap();
    assert_eq!(backend.allocated_bytes(), 2 * 4 * std::mem::size_of::<Blade>());

    store.dispose();
    store.dispose();
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.allocated_bytes(), 0);
    assert!(matches!(store.write(0, &[blade(2.0)]), Err(GrassError::Backend(_))));
}

#[test]
fn backend_round_trips_raw_blade_bytes() {
    let backend = Arc::new(HostBackend::new());
    let buffer = backend.create_buffer("scratch", bytemuck::cast_slice(&[blade(3.0)])).unwrap();
    let bytes = backend.read_buffer(&buffer).unwrap();
    assert_eq!(bytemuck::pod_read_unaligned::<Blade>(&bytes), blade(3.0));
    backend.destroy_buffer(buffer);
    assert_eq!(backend.live_buffers(), 0);
}
