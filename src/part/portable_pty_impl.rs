use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, SlavePty};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::part::part_trait::{PartConfig, PartFactory, TerminalControl, TerminalError, TerminalPart};

/// Chunks buffered between the reader thread and `drain_output`
pub const OUTPUT_CHANNEL_CAPACITY: usize = 1024;

/// Bytes read from the PTY per chunk
const READ_CHUNK_SIZE: usize = 4096;

/// Handles owned once the PTY is open; the program-side ones appear on start
struct PtyHandles {
    master: Box<dyn MasterPty + Send>,
    // 启动后释放，子进程退出时读取端才能收到 EIO
    slave: Option<Box<dyn SlavePty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    child: Option<Box<dyn Child + Send + Sync>>,
    output_rx: Option<mpsc::Receiver<Vec<u8>>>,
}

/// Terminal control backed by a native PTY from portable-pty
pub struct PortablePtyTerminal {
    config: PartConfig,
    handles: RefCell<PtyHandles>,
    reader_finished: Arc<AtomicBool>,
}

impl PortablePtyTerminal {
    pub fn new(config: &PartConfig) -> Result<Self, TerminalError> {
        let pty_system = portable_pty::native_pty_system();

        // Open the PTY pair up front so an unusable PTY fails instantiation
        let pair = pty_system.openpty(PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        })?;

        info!(
            "PortablePty: Opened PTY {}x{}",
            config.cols, config.rows
        );

        Ok(Self {
            config: config.clone(),
            handles: RefCell::new(PtyHandles {
                master: pair.master,
                slave: Some(pair.slave),
                writer: None,
                child: None,
                output_rx: None,
            }),
            reader_finished: Arc::new(AtomicBool::new(false)),
        })
    }

    fn spawn_reader(
        mut reader: Box<dyn Read + Send>,
        tx: mpsc::Sender<Vec<u8>>,
        finished: Arc<AtomicBool>,
    ) -> Result<(), TerminalError> {
        std::thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || {
                let mut buffer = vec![0u8; READ_CHUNK_SIZE];
                loop {
                    match reader.read(&mut buffer) {
                        Ok(0) => {
                            debug!("PTY EOF reached, stopping background reader");
                            break;
                        }
                        Ok(n) => {
                            trace!("PTY background reader: read {} bytes", n);
                            // 通道满时阻塞，直到宿主读取输出
                            if tx.blocking_send(buffer[..n].to_vec()).is_err() {
                                debug!("PTY background reader: receiver dropped, stopping");
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            // EIO is the normal end of a Linux PTY once the child exits
                            debug!("PTY background reader stopped: {}", e);
                            break;
                        }
                    }
                }
                finished.store(true, Ordering::Release);
            })?;
        Ok(())
    }
}

impl TerminalControl for PortablePtyTerminal {
    fn start_program(&self, program: &str, args: &[String]) -> Result<(), TerminalError> {
        let mut handles = self.handles.borrow_mut();
        if handles.child.is_some() {
            return Err(TerminalError::AlreadyStarted);
        }

        info!(
            "PortablePty: Starting command: {:?}, args: {:?}",
            program, args
        );

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &self.config.cwd {
            cmd.cwd(cwd);
        }

        let slave = handles.slave.as_ref().ok_or(TerminalError::AlreadyStarted)?;
        let child = slave.spawn_command(cmd).map_err(|e| {
            error!("PortablePty: Failed to spawn {:?}: {}", program, e);
            TerminalError::SpawnFailed(e.to_string())
        })?;
        // The child holds its own copy of the slave side
        handles.slave = None;

        let writer = handles.master.take_writer()?;
        let reader = handles.master.try_clone_reader()?;
        // 有界通道：宿主不读取时提供背压，避免内存无限增长
        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        Self::spawn_reader(reader, tx, self.reader_finished.clone())?;

        handles.child = Some(child);
        handles.writer = Some(writer);
        handles.output_rx = Some(rx);
        Ok(())
    }

    fn send_input(&self, text: &str) -> Result<(), TerminalError> {
        let mut handles = self.handles.borrow_mut();
        let writer = handles.writer.as_mut().ok_or(TerminalError::NotStarted)?;

        trace!("PortablePty: Writing {} bytes", text.len());
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn drain_output(&self) -> Vec<u8> {
        let mut handles = self.handles.borrow_mut();
        let Some(rx) = handles.output_rx.as_mut() else {
            return Vec::new();
        };

        // At most one channel's worth, so a fast producer cannot keep us here
        let mut output = Vec::new();
        for _ in 0..OUTPUT_CHANNEL_CAPACITY {
            match rx.try_recv() {
                Ok(chunk) => output.extend_from_slice(&chunk),
                Err(_) => break,
            }
        }
        output
    }

    fn is_running(&self) -> bool {
        let mut handles = self.handles.borrow_mut();
        match handles.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("PortablePty: Child exited with {:?}", status);
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    warn!("PortablePty: Failed to query child status: {}", e);
                    !self.reader_finished.load(Ordering::Acquire)
                }
            },
            None => false,
        }
    }
}

impl Drop for PortablePtyTerminal {
    fn drop(&mut self) {
        let handles = self.handles.get_mut();
        if let Some(child) = handles.child.as_mut() {
            if let Ok(None) = child.try_wait() {
                info!("PortablePty: Killing child process on teardown");
                if let Err(e) = child.kill() {
                    error!("PortablePty: Failed to kill child process: {}", e);
                }
            }
        }
    }
}

/// Terminal part wrapping a [`PortablePtyTerminal`]
pub struct PortablePtyPart {
    control: Rc<PortablePtyTerminal>,
}

impl TerminalPart for PortablePtyPart {
    fn control(&self) -> Option<Rc<dyn TerminalControl>> {
        Some(self.control.clone())
    }

    fn name(&self) -> &'static str {
        "pty"
    }
}

// ================ 工厂实现 ================

/// Factory for native PTY parts
#[derive(Default)]
pub struct PortablePtyFactory;

impl PartFactory for PortablePtyFactory {
    fn create(&self, config: &PartConfig) -> Result<Box<dyn TerminalPart>, TerminalError> {
        let terminal = PortablePtyTerminal::new(config).map_err(|e| {
            error!("PortablePty: Failed to open PTY: {}", e);
            TerminalError::NotAvailable(e.to_string())
        })?;
        Ok(Box::new(PortablePtyPart {
            control: Rc::new(terminal),
        }))
    }

    fn name(&self) -> &'static str {
        "pty"
    }
}
