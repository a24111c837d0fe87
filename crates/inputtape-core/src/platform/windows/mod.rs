//! Windows input probe
//!
//! Polls with `GetAsyncKeyState`/`GetCursorPos`, injects with `SendInput`.

use crate::{Error, InputProbe, KeyId, MouseButton, Result};
use std::sync::Arc;

use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT,
    KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetCursorPos, SetCursorPos};

pub fn system_probe() -> Result<Arc<dyn InputProbe>> {
    Ok(Arc::new(WindowsProbe))
}

pub struct WindowsProbe;

impl InputProbe for WindowsProbe {
    fn key_pressed(&self, key: KeyId) -> bool {
        let state = unsafe { GetAsyncKeyState(key.code() as i32) };
        (state as u16) & 0x8000 != 0
    }

    fn cursor_position(&self) -> Result<(i32, i32)> {
        let mut pt = POINT::default();
        unsafe {
            GetCursorPos(&mut pt)
                .map_err(|e| Error::action_failed("GetCursorPos", &format!("{:?}", e)))?;
        }
        Ok((pt.x, pt.y))
    }

    fn send_key(&self, key: KeyId, down: bool) -> Result<()> {
        send_inputs(&[make_key_input(key.code(), !down)])
    }

    fn move_cursor(&self, x: i32, y: i32) -> Result<()> {
        unsafe {
            SetCursorPos(x, y)
                .map_err(|e| Error::action_failed("SetCursorPos", &format!("{:?}", e)))?;
        }
        Ok(())
    }

    fn send_button(&self, button: MouseButton, down: bool) -> Result<()> {
        let flags = match (button, down) {
            (MouseButton::Left, true) => MOUSEEVENTF_LEFTDOWN,
            (MouseButton::Left, false) => MOUSEEVENTF_LEFTUP,
            (MouseButton::Right, true) => MOUSEEVENTF_RIGHTDOWN,
            (MouseButton::Right, false) => MOUSEEVENTF_RIGHTUP,
        };
        send_inputs(&[make_mouse_input(flags)])
    }
}

fn make_mouse_input(flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn make_key_input(vk: u16, key_up: bool) -> INPUT {
    let flags = if key_up {
        KEYEVENTF_KEYUP
    } else {
        KEYBD_EVENT_FLAGS(0)
    };

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send_inputs(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };

    if sent as usize != inputs.len() {
        return Err(Error::action_failed(
            "SendInput",
            &format!("sent {} of {}", sent, inputs.len()),
        ));
    }

    Ok(())
}
