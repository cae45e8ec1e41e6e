use parking_lot::{Mutex, MutexGuard};
use scriptcore::{NativeApi, ProcessRuntime};

static SERIAL: Mutex<()> = Mutex::new(());

/// Engine init state is process-global; tests touching it run one at a time.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock()
}

pub fn runtime() -> anyhow::Result<ProcessRuntime<NativeApi>> {
    Ok(ProcessRuntime::initialize(scriptcore_quickjs::api())?)
}
