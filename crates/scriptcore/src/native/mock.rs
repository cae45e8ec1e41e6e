//! Recording boundary for tests. Handles are fake addresses and are never
//! dereferenced; every protocol violation the real engine would turn into
//! undefined behavior is recorded instead.

use std::{
    collections::{HashMap, HashSet},
    ffi::c_int,
    ptr::{self, NonNull},
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use super::{ContextHandle, ErrorKind, IsolateHandle, NativeBoundary, NativeChar, StringHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init,
    Cleanup,
    NewIsolate(usize),
    DestroyIsolate(usize),
    EnterIsolate(usize),
    LeaveIsolate(usize),
    NewContext(usize),
    EnterContext(usize),
    LeaveContext(usize),
    DestroyContext(usize),
    Eval(String),
    StringInfo(usize),
    DestroyString(usize),
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Text(String),
    Undefined,
    Throw(ErrorKind),
}

#[derive(Default)]
struct State {
    next_addr: usize,
    calls: Vec<Call>,
    violations: Vec<String>,
    fail_init: bool,
    fail_isolate: bool,
    fail_context: bool,
    report_errors: bool,
    outcomes: HashMap<String, Outcome>,
    isolates: HashSet<usize>,
    entered_isolates: HashSet<usize>,
    contexts: HashMap<usize, usize>,
    entered_contexts: HashSet<usize>,
    strings: HashMap<usize, Box<[NativeChar]>>,
    last_error: HashMap<usize, ErrorKind>,
}

impl State {
    fn alloc(&mut self) -> usize {
        self.next_addr += 16;
        self.next_addr
    }

    fn violation(&mut self, msg: impl Into<String>) {
        self.violations.push(msg.into());
    }
}

static NEXT_LIBRARY: AtomicUsize = AtomicUsize::new(1);

pub struct MockBoundary {
    library: usize,
    state: Mutex<State>,
}

impl Default for MockBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBoundary {
    /// A boundary standing for a library of its own.
    pub fn new() -> Self {
        Self {
            library: NEXT_LIBRARY.fetch_add(1, Ordering::Relaxed),
            state: Mutex::default(),
        }
    }

    /// A second boundary over the same library as `other`, with its own
    /// call log.
    pub fn same_library_as(other: &Self) -> Self {
        Self {
            library: other.library,
            state: Mutex::default(),
        }
    }

    pub fn fail_init(self) -> Self {
        self.state.lock().fail_init = true;
        self
    }

    pub fn fail_isolate(self) -> Self {
        self.state.lock().fail_isolate = true;
        self
    }

    pub fn fail_context(self) -> Self {
        self.state.lock().fail_context = true;
        self
    }

    pub fn report_errors(self) -> Self {
        self.state.lock().report_errors = true;
        self
    }

    pub fn respond(self, source: &str, outcome: Outcome) -> Self {
        self.state
            .lock()
            .outcomes
            .insert(source.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.lock().violations.clone()
    }

    pub fn live_handles(&self) -> usize {
        let state = self.state.lock();
        state.isolates.len() + state.contexts.len() + state.strings.len()
    }

    /// Hands out a string handle directly, bypassing evaluation.
    pub fn make_string(&self, text: &str) -> *mut StringHandle {
        let mut state = self.state.lock();
        let addr = state.alloc();
        state
            .strings
            .insert(addr, text.encode_utf16().collect::<Vec<_>>().into_boxed_slice());
        ptr::without_provenance_mut(addr)
    }
}

fn read_source(source: *const NativeChar) -> String {
    let mut units = Vec::new();
    let mut cursor = source;
    // SAFETY: callers pass a NUL-terminated buffer.
    unsafe {
        while *cursor != 0 {
            units.push(*cursor);
            cursor = cursor.add(1);
        }
    }
    String::from_utf16_lossy(&units)
}

unsafe impl NativeBoundary for MockBoundary {
    fn library_id(&self) -> usize {
        self.library
    }

    fn init(&self) -> bool {
        let mut state = self.state.lock();
        state.calls.push(Call::Init);
        !state.fail_init
    }

    fn cleanup(&self) {
        let mut state = self.state.lock();
        state.calls.push(Call::Cleanup);
        if !state.isolates.is_empty() {
            state.violation("cleanup with live isolates");
        }
    }

    fn new_isolate(&self) -> *mut IsolateHandle {
        let mut state = self.state.lock();
        if state.fail_isolate {
            state.calls.push(Call::NewIsolate(0));
            return ptr::null_mut();
        }
        let addr = state.alloc();
        state.calls.push(Call::NewIsolate(addr));
        state.isolates.insert(addr);
        ptr::without_provenance_mut(addr)
    }

    unsafe fn destroy_isolate(&self, isolate: NonNull<IsolateHandle>) {
        let addr = isolate.addr().get();
        let mut state = self.state.lock();
        state.calls.push(Call::DestroyIsolate(addr));
        if !state.isolates.remove(&addr) {
            state.violation(format!("destroy of dead isolate {addr}"));
        }
        if state.entered_isolates.contains(&addr) {
            state.violation(format!("destroy of entered isolate {addr}"));
        }
        if state.contexts.values().any(|owner| *owner == addr) {
            state.violation(format!("destroy of isolate {addr} with live context"));
        }
    }

    unsafe fn enter_isolate(&self, isolate: NonNull<IsolateHandle>) {
        let addr = isolate.addr().get();
        let mut state = self.state.lock();
        state.calls.push(Call::EnterIsolate(addr));
        if !state.entered_isolates.insert(addr) {
            state.violation(format!("re-entry of isolate {addr}"));
        }
    }

    unsafe fn leave_isolate(&self, isolate: NonNull<IsolateHandle>) {
        let addr = isolate.addr().get();
        let mut state = self.state.lock();
        state.calls.push(Call::LeaveIsolate(addr));
        if !state.entered_isolates.remove(&addr) {
            state.violation(format!("leave of isolate {addr} that is not entered"));
        }
    }

    unsafe fn new_context(&self, isolate: NonNull<IsolateHandle>) -> *mut ContextHandle {
        let owner = isolate.addr().get();
        let mut state = self.state.lock();
        if !state.entered_isolates.contains(&owner) {
            state.violation(format!("context created on isolate {owner} not entered"));
        }
        if state.fail_context {
            state.calls.push(Call::NewContext(0));
            return ptr::null_mut();
        }
        let addr = state.alloc();
        state.calls.push(Call::NewContext(addr));
        state.contexts.insert(addr, owner);
        ptr::without_provenance_mut(addr)
    }

    unsafe fn enter_context(&self, context: NonNull<ContextHandle>) {
        let addr = context.addr().get();
        let mut state = self.state.lock();
        state.calls.push(Call::EnterContext(addr));
        match state.contexts.get(&addr).copied() {
            Some(owner) if state.entered_isolates.contains(&owner) => {}
            _ => state.violation(format!("enter of context {addr} without entered isolate")),
        }
        if !state.entered_contexts.insert(addr) {
            state.violation(format!("re-entry of context {addr}"));
        }
    }

    unsafe fn leave_context(&self, context: NonNull<ContextHandle>) {
        let addr = context.addr().get();
        let mut state = self.state.lock();
        state.calls.push(Call::LeaveContext(addr));
        if !state.entered_contexts.remove(&addr) {
            state.violation(format!("leave of context {addr} that is not entered"));
        }
    }

    unsafe fn destroy_context(&self, context: NonNull<ContextHandle>) {
        let addr = context.addr().get();
        let mut state = self.state.lock();
        state.calls.push(Call::DestroyContext(addr));
        match state.contexts.remove(&addr) {
            Some(owner) if state.entered_isolates.contains(&owner) => {}
            Some(_) => state.violation(format!("destroy of context {addr} outside its isolate")),
            None => state.violation(format!("destroy of dead context {addr}")),
        }
        if state.entered_contexts.contains(&addr) {
            state.violation(format!("destroy of entered context {addr}"));
        }
    }

    unsafe fn eval_as_string(
        &self,
        isolate: NonNull<IsolateHandle>,
        context: NonNull<ContextHandle>,
        source: *const NativeChar,
    ) -> *mut StringHandle {
        let source = read_source(source);
        let mut state = self.state.lock();
        state.calls.push(Call::Eval(source.clone()));
        let isolate = isolate.addr().get();
        if !state.entered_isolates.contains(&isolate)
            || !state.entered_contexts.contains(&context.addr().get())
        {
            state.violation("eval outside an entered isolate and context");
        }
        state.last_error.remove(&isolate);
        match state.outcomes.get(&source).cloned() {
            Some(Outcome::Text(text)) => {
                let addr = state.alloc();
                state
                    .strings
                    .insert(addr, text.encode_utf16().collect::<Vec<_>>().into_boxed_slice());
                ptr::without_provenance_mut(addr)
            }
            Some(Outcome::Throw(kind)) => {
                state.last_error.insert(isolate, kind);
                ptr::null_mut()
            }
            Some(Outcome::Undefined) | None => ptr::null_mut(),
        }
    }

    unsafe fn string_info(
        &self,
        string: NonNull<StringHandle>,
        len: *mut c_int,
    ) -> *const NativeChar {
        let addr = string.addr().get();
        let mut state = self.state.lock();
        state.calls.push(Call::StringInfo(addr));
        let Some((ptr, units_len)) = state.strings.get(&addr).map(|u| (u.as_ptr(), u.len())) else {
            state.violation(format!("info of dead string {addr}"));
            return ptr::null();
        };
        unsafe { len.write(c_int::try_from(units_len).unwrap_or(c_int::MAX)) };
        ptr
    }

    unsafe fn destroy_string(&self, string: NonNull<StringHandle>) {
        let addr = string.addr().get();
        let mut state = self.state.lock();
        state.calls.push(Call::DestroyString(addr));
        if state.strings.remove(&addr).is_none() {
            state.violation(format!("double release of string {addr}"));
        }
    }

    unsafe fn last_error(&self, isolate: NonNull<IsolateHandle>) -> Option<ErrorKind> {
        let state = self.state.lock();
        if !state.report_errors {
            return None;
        }
        state.last_error.get(&isolate.addr().get()).copied()
    }
}
