use storage::{Disk, DiskError, MemoryDisk};
use vm::memory::{FreeRegion, MemoryError, MemoryManager};

#[test]
fn access_outside_segment_always_faults() {
    let mut mm = MemoryManager::new(64);
    let _guard = mm.allocate(8).unwrap();
    let seg = mm.allocate(16).unwrap();
    let _tail = mm.allocate(8).unwrap();

    for addr in [0, seg.base() - 1, seg.limit(), seg.limit() + 1, 63, 1000] {
        assert!(
            matches!(mm.read(seg, addr), Err(MemoryError::SegmentationFault { .. })),
            "read at {} should fault",
            addr
        );
        assert!(
            matches!(mm.write(seg, addr, 0xaa), Err(MemoryError::SegmentationFault { .. })),
            "write at {} should fault",
            addr
        );
    }
    // in-bounds edges succeed
    mm.write(seg, seg.base(), 1).unwrap();
    mm.write(seg, seg.limit() - 1, 2).unwrap();
    assert_eq!(mm.read(seg, seg.base()).unwrap(), 1);
    assert_eq!(mm.read(seg, seg.limit() - 1).unwrap(), 2);
}

#[test]
fn freed_segment_can_no_longer_be_accessed() {
    let mut mm = MemoryManager::new(16);
    let seg = mm.allocate(4).unwrap();
    mm.free(seg).unwrap();
    assert!(matches!(mm.read(seg, seg.base()), Err(MemoryError::SegmentationFault { .. })));
}

#[test]
fn oversized_allocation_changes_nothing() {
    let mut mm = MemoryManager::new(769);
    let a = mm.allocate(100).unwrap();
    let before: Vec<FreeRegion> = mm.free_regions().to_vec();

    let err = mm.allocate(770).unwrap_err();
    assert!(matches!(
        err,
        MemoryError::OutOfMemory { requested: 770, largest_free: 669 }
    ));
    assert_eq!(mm.free_regions(), before.as_slice());
    assert_eq!(mm.live_segments().collect::<Vec<_>>(), vec![a]);
}

#[test]
fn fragmented_memory_reports_out_of_memory() {
    let mut mm = MemoryManager::new(30);
    let a = mm.allocate(10).unwrap();
    let _b = mm.allocate(10).unwrap();
    let c = mm.allocate(10).unwrap();
    mm.free(a).unwrap();
    mm.free(c).unwrap();
    assert_eq!(mm.free_bytes(), 20);
    assert!(matches!(mm.allocate(15), Err(MemoryError::OutOfMemory { .. })));
}

#[test]
fn evict_then_restore_round_trips_bytes() {
    let mut mm = MemoryManager::new(32);
    let mut disk = MemoryDisk::new();
    let seg = mm.allocate(6).unwrap();
    mm.write_slice(seg, seg.base(), &[1, 2, 3, 4, 5, 6]).unwrap();

    let key = mm.evict(seg, &mut disk).unwrap();
    assert!(disk.exists(&key));
    assert_eq!(mm.free_bytes(), 32);

    // occupy the old base so the restore lands elsewhere
    let blocker = mm.allocate(4).unwrap();
    let restored = mm.restore(&key, &mut disk).unwrap();
    assert_ne!(restored.base(), seg.base());
    assert_eq!(mm.segment_bytes(restored).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    assert!(!disk.exists(&key));
    mm.free(blocker).unwrap();
}

#[test]
fn evict_on_full_disk_keeps_segment() {
    let mut mm = MemoryManager::new(16);
    let mut disk = MemoryDisk::with_capacity(2);
    let seg = mm.allocate(4).unwrap();
    mm.write_slice(seg, seg.base(), &[9, 8, 7, 6]).unwrap();

    let err = mm.evict(seg, &mut disk).unwrap_err();
    assert!(matches!(err, MemoryError::Disk(DiskError::DiskFull { .. })));
    assert!(mm.is_live(seg));
    assert_eq!(mm.segment_bytes(seg).unwrap(), vec![9, 8, 7, 6]);
    assert!(disk.keys().is_empty());
}

#[test]
fn restore_without_room_leaves_record_on_disk() {
    let mut mm = MemoryManager::new(8);
    let mut disk = MemoryDisk::new();
    let seg = mm.allocate(6).unwrap();
    let key = mm.evict(seg, &mut disk).unwrap();
    let _hog = mm.allocate(4).unwrap();

    assert!(matches!(mm.restore(&key, &mut disk), Err(MemoryError::OutOfMemory { .. })));
    assert!(disk.exists(&key));
}

#[test]
fn restore_of_missing_record_is_not_found() {
    let mut mm = MemoryManager::new(8);
    let mut disk = MemoryDisk::new();
    assert!(matches!(
        mm.restore("swap:99", &mut disk),
        Err(MemoryError::Disk(DiskError::NotFound { .. }))
    ));
    assert_eq!(mm.free_bytes(), 8);
}

#[test]
fn stale_swap_records_are_discarded() {
    let mut disk = MemoryDisk::new();
    disk.write("swap:0", &[1, 2, 3]).unwrap();
    disk.write("swap:7", &[4]).unwrap();
    disk.write("swapfile", &[5]).unwrap();

    let mut mm = MemoryManager::new(16);
    let stale = mm.discard_stale_swap(&mut disk).unwrap();
    assert_eq!(stale, vec!["swap:0".to_string(), "swap:7".to_string()]);
    assert_eq!(disk.keys(), vec!["swapfile".to_string()]);

    // fresh keys start over without clashing
    let seg = mm.allocate(4).unwrap();
    assert_eq!(mm.evict(seg, &mut disk).unwrap(), "swap:0");
}
