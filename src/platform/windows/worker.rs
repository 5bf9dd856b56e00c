// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Backend thread with the message-only window.
//!
//! Raw Input delivers its notifications through a window procedure, so the
//! backend runs a dedicated thread with a `HWND_MESSAGE` window and a plain
//! `GetMessageW` loop. Registering with `RIDEV_DEVNOTIFY` makes Windows
//! replay an arrival for every device that is already plugged in, which is
//! how the initial enumeration happens. A coarse timer drives XInput
//! polling from the same loop.

use std::cell::RefCell;
use std::iter;
use std::mem;
use std::ptr;
use std::sync::mpsc;
use std::thread;

use log::{debug, error, warn};

use windows_sys::Win32::Devices::HumanInterfaceDevice::{
    HID_USAGE_GENERIC_GAMEPAD, HID_USAGE_GENERIC_JOYSTICK,
    HID_USAGE_GENERIC_MULTI_AXIS_CONTROLLER, HID_USAGE_PAGE_GENERIC,
};
use windows_sys::Win32::Foundation::{
    GetLastError, ERROR_CLASS_ALREADY_EXISTS, HWND, LPARAM, LRESULT, WPARAM,
};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::Input::{
    RegisterRawInputDevices, RAWINPUTDEVICE, RIDEV_DEVNOTIFY, RIDEV_INPUTSINK,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW, KillTimer,
    PostMessageW, PostQuitMessage, RegisterClassExW, SetTimer, TranslateMessage, GIDC_ARRIVAL,
    GIDC_REMOVAL, HWND_MESSAGE, MSG, WM_CLOSE, WM_DESTROY, WM_INPUT, WM_INPUT_DEVICE_CHANGE,
    WM_TIMER, WNDCLASSEXW,
};

use super::hid::RawInputSource;
use super::xinput::XInputApi;
use crate::dispatch::Dispatcher;
use crate::slot::SharedSlots;

const POLL_TIMER_ID: usize = 1;
const POLL_INTERVAL_MS: u32 = 8;

type WinDispatcher = Dispatcher<RawInputSource, XInputApi>;

thread_local! {
    // The window procedure cannot carry a context pointer, so the backend
    // thread parks its dispatcher here before entering the message loop.
    static DISPATCHER: RefCell<Option<WinDispatcher>> = const { RefCell::new(None) };
}

fn with_dispatcher(f: impl FnOnce(&mut WinDispatcher)) {
    DISPATCHER.with(|cell| {
        if let Some(dispatcher) = cell.borrow_mut().as_mut() {
            f(dispatcher);
        }
    });
}

/// Handle to the backend thread.
///
/// [`Worker::stop`] posts `WM_CLOSE` to the message window; the thread tears
/// the window down and exits on its own.
pub struct Worker {
    hwnd: Option<isize>,
}

impl Worker {
    pub fn spawn(slots: SharedSlots) -> Worker {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("winjoy".to_owned())
            .spawn(move || worker_main(slots, tx));
        if let Err(err) = spawned {
            error!("failed to spawn input thread: {}", err);
            return Worker { hwnd: None };
        }
        // Blocks until the window exists, so a stop right after spawn has
        // somewhere to post to.
        let hwnd = match rx.recv() {
            Ok(hwnd) => hwnd,
            Err(_) => None,
        };
        Worker { hwnd }
    }

    pub fn stop(&mut self) {
        if let Some(hwnd) = self.hwnd.take() {
            unsafe { PostMessageW(hwnd as HWND, WM_CLOSE, 0, 0) };
        }
    }
}

fn worker_main(slots: SharedSlots, ready: mpsc::Sender<Option<isize>>) {
    let hwnd = match unsafe { create_message_window() } {
        Ok(hwnd) => hwnd,
        Err(call) => {
            error!("{} failed with code {:#x}", call, unsafe { GetLastError() });
            let _ = ready.send(None);
            return;
        }
    };

    let dispatcher = Dispatcher::new(RawInputSource::new(), XInputApi, slots);
    DISPATCHER.with(|cell| *cell.borrow_mut() = Some(dispatcher));
    let _ = ready.send(Some(hwnd as isize));
    debug!("input thread ready");

    let mut msg: MSG = unsafe { mem::zeroed() };
    loop {
        let result = unsafe { GetMessageW(&mut msg, ptr::null_mut(), 0, 0) };
        // Zero is WM_QUIT, negative means the window is already gone.
        if result <= 0 {
            break;
        }
        unsafe {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    DISPATCHER.with(|cell| cell.borrow_mut().take());
    debug!("input thread exited");
}

/// On failure returns the name of the losing call; `GetLastError` still
/// holds its code.
unsafe fn create_message_window() -> Result<HWND, &'static str> {
    let class_name = wide("winjoy-input");
    let instance = GetModuleHandleW(ptr::null());

    let class = WNDCLASSEXW {
        cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
        style: 0,
        lpfnWndProc: Some(wnd_proc),
        cbClsExtra: 0,
        cbWndExtra: 0,
        hInstance: instance,
        hIcon: ptr::null_mut(),
        hCursor: ptr::null_mut(),
        hbrBackground: ptr::null_mut(),
        lpszMenuName: ptr::null(),
        lpszClassName: class_name.as_ptr(),
        hIconSm: ptr::null_mut(),
    };
    // A second instance in the same process reuses the registered class.
    if RegisterClassExW(&class) == 0 && GetLastError() != ERROR_CLASS_ALREADY_EXISTS {
        return Err("RegisterClassExW");
    }

    let hwnd = CreateWindowExW(
        0,
        class_name.as_ptr(),
        ptr::null(),
        0,
        0,
        0,
        0,
        0,
        HWND_MESSAGE,
        ptr::null_mut(),
        instance,
        ptr::null(),
    );
    if hwnd.is_null() {
        return Err("CreateWindowExW");
    }

    let filter = [
        raw_input_device(HID_USAGE_GENERIC_JOYSTICK, hwnd),
        raw_input_device(HID_USAGE_GENERIC_GAMEPAD, hwnd),
        raw_input_device(HID_USAGE_GENERIC_MULTI_AXIS_CONTROLLER, hwnd),
    ];
    if RegisterRawInputDevices(
        filter.as_ptr(),
        filter.len() as u32,
        mem::size_of::<RAWINPUTDEVICE>() as u32,
    ) == 0
    {
        DestroyWindow(hwnd);
        return Err("RegisterRawInputDevices");
    }

    // Without the timer XInput pads still arrive, they just stop updating.
    if SetTimer(hwnd, POLL_TIMER_ID, POLL_INTERVAL_MS, None) == 0 {
        warn!("SetTimer failed with code {:#x}", GetLastError());
    }

    Ok(hwnd)
}

fn raw_input_device(usage: u16, hwnd: HWND) -> RAWINPUTDEVICE {
    RAWINPUTDEVICE {
        usUsagePage: HID_USAGE_PAGE_GENERIC,
        usUsage: usage,
        // INPUTSINK keeps reports coming while unfocused, DEVNOTIFY turns
        // on the arrival and removal messages.
        dwFlags: RIDEV_INPUTSINK | RIDEV_DEVNOTIFY,
        hwndTarget: hwnd,
    }
}

unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_INPUT_DEVICE_CHANGE => {
            match wparam as u32 {
                GIDC_ARRIVAL => with_dispatcher(|d| d.device_arrived(lparam)),
                GIDC_REMOVAL => with_dispatcher(|d| d.device_removed(lparam)),
                _ => {}
            }
            0
        }
        WM_INPUT => {
            with_dispatcher(|d| d.input_report(lparam));
            // The system frees the raw input buffer in DefWindowProcW.
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        WM_TIMER if wparam == POLL_TIMER_ID => {
            with_dispatcher(|d| d.poll_tick());
            0
        }
        WM_CLOSE => {
            KillTimer(hwnd, POLL_TIMER_ID);
            DestroyWindow(hwnd);
            0
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            0
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(iter::once(0)).collect()
}
