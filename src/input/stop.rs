//! Run cancellation. A `CancelToken` is handed to the workflow and polled at
//! contact boundaries; the global-hotkey listener and the signal handler are
//! its only writers.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Write-once stop flag: single writer (listener or signal handler), polled
/// by the main loop between contacts. A send in progress always completes or
/// exhausts its retries before the stop takes effect.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(target_os = "linux")]
pub use listener::StopListener;

#[cfg(target_os = "linux")]
mod listener {
    use super::CancelToken;
    use anyhow::{Context, Result};
    use evdev::{Device, InputEventKind, Key};
    use std::collections::HashSet;
    use std::io;
    use std::os::fd::AsRawFd;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tracing::{debug, error, info, warn};

    /// Background thread watching `/dev/input` keyboards for the stop combo.
    /// Sets the cancel token once and exits.
    pub struct StopListener {
        stop_flag: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl StopListener {
        pub fn spawn(shortcut: &str, token: CancelToken) -> Result<Self> {
            let target_keys = parse_shortcut(shortcut)?;
            let stop_flag = Arc::new(AtomicBool::new(false));
            let runner_flag = Arc::clone(&stop_flag);
            let shortcut_name = shortcut.to_string();

            let handle = thread::spawn(move || {
                if let Err(e) = run_listener(target_keys, &shortcut_name, token, runner_flag) {
                    error!("Stop-hotkey listener error: {}", e);
                }
            });

            Ok(Self {
                stop_flag,
                handle: Some(handle),
            })
        }

        pub fn stop(&mut self) {
            self.stop_flag.store(true, Ordering::Relaxed);
            if let Some(handle) = self.handle.take() {
                if let Err(err) = handle.join() {
                    error!("Stop-hotkey listener thread panicked: {:?}", err);
                }
            }
        }
    }

    impl Drop for StopListener {
        fn drop(&mut self) {
            self.stop();
        }
    }

    fn run_listener(
        target_keys: HashSet<Key>,
        shortcut: &str,
        token: CancelToken,
        stop: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut devices = find_keyboard_devices()?;
        if devices.is_empty() {
            warn!("No keyboard devices found; stop hotkey {} is inactive", shortcut);
            warn!("Make sure you have read permissions for /dev/input/event*");
            return Ok(());
        }

        info!(
            "Listening for stop shortcut {} on {} keyboard device(s)",
            shortcut,
            devices.len()
        );

        let mut pressed_keys: HashSet<Key> = HashSet::new();

        loop {
            if stop.load(Ordering::Relaxed) {
                debug!("Stop-hotkey listener shutting down");
                return Ok(());
            }

            let mut disconnected = Vec::new();

            for (index, device) in devices.iter_mut().enumerate() {
                match device.fetch_events() {
                    Ok(events) => {
                        for event in events {
                            if let InputEventKind::Key(key) = event.kind() {
                                let key = normalize_key(key);
                                match event.value() {
                                    1 => {
                                        pressed_keys.insert(key);
                                        if target_keys.is_subset(&pressed_keys) {
                                            info!(
                                                "Stop shortcut {} detected; stopping after the current contact",
                                                shortcut
                                            );
                                            token.request_stop();
                                            return Ok(());
                                        }
                                    }
                                    0 => {
                                        pressed_keys.remove(&key);
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                    Err(err) => {
                        if is_device_disconnect_error(&err) {
                            disconnected.push(index);
                        } else {
                            debug!("Keyboard read error: {}", err);
                        }
                    }
                }
            }

            for index in disconnected.into_iter().rev() {
                devices.remove(index);
                warn!("Keyboard device disconnected; {} remaining", devices.len());
            }
            if devices.is_empty() {
                warn!("All keyboard devices gone; stop hotkey {} is inactive", shortcut);
                return Ok(());
            }

            thread::sleep(Duration::from_millis(25));
        }
    }

    /// Parses combos like `CTRL+E` or `SUPER+F9` into the evdev key set that
    /// must be held simultaneously.
    pub fn parse_shortcut(shortcut: &str) -> Result<HashSet<Key>> {
        let mut keys = HashSet::new();
        for part in shortcut.split('+') {
            let part = part.trim().to_ascii_uppercase();
            if part.is_empty() {
                continue;
            }
            keys.insert(parse_key(&part)?);
        }
        if keys.is_empty() {
            anyhow::bail!("Empty stop shortcut");
        }
        Ok(keys)
    }

    fn parse_key(key_str: &str) -> Result<Key> {
        match key_str {
            "SUPER" | "META" | "WIN" => Ok(Key::KEY_LEFTMETA),
            "ALT" => Ok(Key::KEY_LEFTALT),
            "CTRL" | "CONTROL" => Ok(Key::KEY_LEFTCTRL),
            "SHIFT" => Ok(Key::KEY_LEFTSHIFT),

            "F1" => Ok(Key::KEY_F1),
            "F2" => Ok(Key::KEY_F2),
            "F3" => Ok(Key::KEY_F3),
            "F4" => Ok(Key::KEY_F4),
            "F5" => Ok(Key::KEY_F5),
            "F6" => Ok(Key::KEY_F6),
            "F7" => Ok(Key::KEY_F7),
            "F8" => Ok(Key::KEY_F8),
            "F9" => Ok(Key::KEY_F9),
            "F10" => Ok(Key::KEY_F10),
            "F11" => Ok(Key::KEY_F11),
            "F12" => Ok(Key::KEY_F12),

            "A" => Ok(Key::KEY_A),
            "B" => Ok(Key::KEY_B),
            "C" => Ok(Key::KEY_C),
            "D" => Ok(Key::KEY_D),
            "E" => Ok(Key::KEY_E),
            "F" => Ok(Key::KEY_F),
            "G" => Ok(Key::KEY_G),
            "H" => Ok(Key::KEY_H),
            "I" => Ok(Key::KEY_I),
            "J" => Ok(Key::KEY_J),
            "K" => Ok(Key::KEY_K),
            "L" => Ok(Key::KEY_L),
            "M" => Ok(Key::KEY_M),
            "N" => Ok(Key::KEY_N),
            "O" => Ok(Key::KEY_O),
            "P" => Ok(Key::KEY_P),
            "Q" => Ok(Key::KEY_Q),
            "R" => Ok(Key::KEY_R),
            "S" => Ok(Key::KEY_S),
            "T" => Ok(Key::KEY_T),
            "U" => Ok(Key::KEY_U),
            "V" => Ok(Key::KEY_V),
            "W" => Ok(Key::KEY_W),
            "X" => Ok(Key::KEY_X),
            "Y" => Ok(Key::KEY_Y),
            "Z" => Ok(Key::KEY_Z),

            "0" => Ok(Key::KEY_0),
            "1" => Ok(Key::KEY_1),
            "2" => Ok(Key::KEY_2),
            "3" => Ok(Key::KEY_3),
            "4" => Ok(Key::KEY_4),
            "5" => Ok(Key::KEY_5),
            "6" => Ok(Key::KEY_6),
            "7" => Ok(Key::KEY_7),
            "8" => Ok(Key::KEY_8),
            "9" => Ok(Key::KEY_9),

            _ => Err(anyhow::anyhow!("Unknown key in stop shortcut: {}", key_str)),
        }
    }

    /// Right-hand modifiers count as their left-hand siblings so the combo
    /// works with either.
    fn normalize_key(key: Key) -> Key {
        match key {
            Key::KEY_RIGHTCTRL => Key::KEY_LEFTCTRL,
            Key::KEY_RIGHTSHIFT => Key::KEY_LEFTSHIFT,
            Key::KEY_RIGHTALT => Key::KEY_LEFTALT,
            Key::KEY_RIGHTMETA => Key::KEY_LEFTMETA,
            other => other,
        }
    }

    fn find_keyboard_devices() -> Result<Vec<Device>> {
        let mut keyboards = Vec::new();
        for (path, device) in evdev::enumerate() {
            if is_keyboard_device(&device) {
                if let Err(err) = set_device_nonblocking(&device) {
                    warn!("Failed to set non-blocking mode for {:?}: {}", path, err);
                    continue;
                }
                debug!(
                    "Watching keyboard device: {} at {:?}",
                    device.name().unwrap_or("Unknown"),
                    path
                );
                keyboards.push(device);
            }
        }
        Ok(keyboards)
    }

    fn is_keyboard_device(device: &Device) -> bool {
        device.supported_keys().is_some_and(|keys| {
            keys.contains(Key::KEY_A) && keys.contains(Key::KEY_S) && keys.contains(Key::KEY_D)
        })
    }

    fn set_device_nonblocking(device: &Device) -> Result<()> {
        let fd = device.as_raw_fd();

        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(anyhow::anyhow!(
                "fcntl(F_GETFL) failed: {}",
                io::Error::last_os_error()
            ));
        }

        if (flags & libc::O_NONBLOCK) != 0 {
            return Ok(());
        }

        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(anyhow::anyhow!(
                "fcntl(F_SETFL) failed: {}",
                io::Error::last_os_error()
            ));
        }

        Ok(())
    }

    fn is_device_disconnect_error(err: &io::Error) -> bool {
        matches!(
            err.raw_os_error(),
            Some(code) if code == libc::ENODEV || code == libc::EBADF || code == libc::ENXIO
        )
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_ctrl_e() {
            let keys = parse_shortcut("CTRL+E").expect("valid shortcut");
            assert!(keys.contains(&Key::KEY_LEFTCTRL));
            assert!(keys.contains(&Key::KEY_E));
            assert_eq!(keys.len(), 2);
        }

        #[test]
        fn parsing_is_case_insensitive() {
            let keys = parse_shortcut("ctrl+e").expect("valid shortcut");
            assert!(keys.contains(&Key::KEY_LEFTCTRL));
        }

        #[test]
        fn rejects_unknown_keys() {
            assert!(parse_shortcut("CTRL+BANANA").is_err());
            assert!(parse_shortcut("").is_err());
        }

        #[test]
        fn right_modifiers_normalize_to_left() {
            assert_eq!(normalize_key(Key::KEY_RIGHTCTRL), Key::KEY_LEFTCTRL);
            assert_eq!(normalize_key(Key::KEY_E), Key::KEY_E);
        }

        #[test]
        fn detects_enodev_as_disconnect() {
            let err = io::Error::from_raw_os_error(libc::ENODEV);
            assert!(is_device_disconnect_error(&err));
            let err = io::Error::from(io::ErrorKind::WouldBlock);
            assert!(!is_device_disconnect_error(&err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_unset_and_latches() {
        let token = CancelToken::new();
        assert!(!token.is_stopped());
        token.request_stop();
        assert!(token.is_stopped());

        let clone = token.clone();
        assert!(clone.is_stopped());
    }
}
