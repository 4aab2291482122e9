use std::sync::Arc;

use super::serial::{SerialError, SerialReader, SerialWriter};
use super::{load, save};
use crate::config::{Lv2Config, SAVESTATE_MAGIC, SAVESTATE_VERSION};
use crate::kernel::Lv2;
use crate::lwcond::syscall::sys_lwcond_create;
use crate::lwmutex::syscall::{sys_lwmutex_create, sys_lwmutex_unlock};
use crate::syscall::SyscallRequest;
use crate::task::{CpuFlag, PpuThread, Protocol, WaitSnapshot};

#[test]
fn reader_reports_truncation() {
    let mut ar = SerialWriter::new();
    ar.put_u16(0xBEEF);
    let bytes = ar.into_bytes();
    assert_eq!(bytes, [0xBE, 0xEF]);

    let mut reader = SerialReader::new(&bytes);
    assert_eq!(reader.get_u32(), Err(SerialError::UnexpectedEof { needed: 2 }));
}

#[test]
fn reader_rejects_bad_bool_and_utf8() {
    let mut reader = SerialReader::new(&[2]);
    assert_eq!(reader.get_bool(), Err(SerialError::Tag(2)));

    let mut ar = SerialWriter::new();
    ar.put_u32(2);
    let mut bytes = ar.into_bytes();
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    assert_eq!(SerialReader::new(&bytes).get_str(), Err(SerialError::Utf8));
}

#[test]
fn objects_survive_at_their_ids() {
    let lv2 = Lv2::new();
    let ppu = lv2.create_ppu("main", 1000).unwrap();
    let mutex_id = sys_lwmutex_create(&lv2, 4, 0x3000, -1, u64::from_be_bytes(*b"mtx\0\0\0\0\0")).unwrap();
    let cond_id = sys_lwcond_create(&lv2, mutex_id, 0x3100, u64::from_be_bytes(*b"cnd\0\0\0\0\0")).unwrap();
    sys_lwmutex_unlock(&lv2, &ppu, mutex_id).unwrap();

    let restored = load(&save(&lv2), Lv2Config::default()).unwrap();
    assert!(restored.suspended.is_empty());

    let mutex = restored.lv2.lwmutex(mutex_id).unwrap();
    assert_eq!(mutex.protocol(), Protocol::Retry);
    assert_eq!(mutex.control(), 0x3000);
    assert_eq!(crate::lwcond::name64(mutex.name()), "mtx");
    assert_eq!(mutex.signaled(), 1);

    let cond = restored.lv2.lwcond(cond_id).unwrap();
    assert_eq!(cond.lwmutex_id(), mutex_id);
    assert_eq!(cond.protocol(), Protocol::Priority);
    assert_eq!(cond.control(), 0x3100);
    assert_eq!(cond.waiters(), 0);

    let main = restored.lv2.ppu(ppu.id()).unwrap();
    assert_eq!(main.name(), "main");
    assert_eq!(main.priority(), 1000);
}

#[test]
fn pending_call_and_snapshot_are_kept() {
    let lv2 = Lv2::new();
    let ppu = lv2.create_ppu("waiter", 700).unwrap();
    let request = SyscallRequest {
        num: 109,
        args: [0x8500_0100, 0x8500_0000, 0, 0, 0, 0],
    };
    ppu.set_pending(Some(request));
    ppu.store_wait_snapshot(WaitSnapshot { mutex_sleep: true });
    ppu.set_gpr3(0);

    let restored = load(&save(&lv2), Lv2Config::default()).unwrap();
    assert_eq!(restored.suspended.len(), 1);
    let thread: &Arc<PpuThread> = &restored.suspended[0];
    assert_eq!(thread.id(), ppu.id());
    assert_eq!(thread.pending(), Some(request));
    assert_eq!(thread.wait_snapshot(), Some(WaitSnapshot { mutex_sleep: true }));
    assert!(thread.state().contains(CpuFlag::REPLAY));
    assert!(!thread.state().contains(CpuFlag::AGAIN));
}

#[test]
fn header_is_checked() {
    assert_eq!(
        load(&[0, 0, 0, 0, 0, 1], Lv2Config::default()).err(),
        Some(SerialError::BadMagic(0))
    );

    let mut ar = SerialWriter::new();
    ar.put_u32(SAVESTATE_MAGIC);
    ar.put_u16(SAVESTATE_VERSION + 1);
    assert_eq!(
        load(&ar.into_bytes(), Lv2Config::default()).err(),
        Some(SerialError::UnsupportedVersion(SAVESTATE_VERSION + 1))
    );

    let mut bytes = save(&Lv2::new());
    bytes.push(0);
    assert_eq!(
        load(&bytes, Lv2Config::default()).err(),
        Some(SerialError::TrailingBytes(1))
    );
}

#[test]
fn restore_respects_capacity() {
    let lv2 = Lv2::new();
    for _ in 0..3 {
        sys_lwmutex_create(&lv2, 1, 0, 0, 0).unwrap();
    }
    let bytes = save(&lv2);
    let small = Lv2Config::default().with_object_capacity(2);
    assert_eq!(
        load(&bytes, small).err(),
        Some(SerialError::IdUnavailable(0x8500_0200))
    );
}
