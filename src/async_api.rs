use crate::{EngineConfig, Error, Launcher, Result, ScriptResult, Viewport};
use log::{debug, warn};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

enum Command {
    SetContent(String, oneshot::Sender<Result<()>>),
    WaitForSelector(String, oneshot::Sender<Result<bool>>),
    EvalInPage(String, oneshot::Sender<Result<ScriptResult>>),
    SetViewport(Viewport, oneshot::Sender<Result<()>>),
    Screenshot(oneshot::Sender<Result<Vec<u8>>>),
    ClosePage(oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly browser session backed by a dedicated worker thread.
///
/// The worker thread owns the `Engine` returned by the launcher and executes
/// commands sent from async tasks, so callers get an async interface without
/// requiring the engine to be `Send` across threads.
///
/// The session is released on every exit path: an explicit [`Browser::close`]
/// closes it right away, and if every `Browser`/`Page` handle is dropped
/// without closing (an early return, a `?`, a cancelled request) the worker
/// notices the disconnected channel and closes the engine itself.
pub struct Browser {
    cmd_tx: Sender<Command>,
}

/// A handle to the session's single page.
pub struct Page {
    cmd_tx: Sender<Command>,
}

impl Browser {
    /// Launch a new session (spawns a background thread that owns the engine).
    pub async fn launch(launcher: Arc<dyn Launcher>, config: EngineConfig) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::Builder::new()
            .name("htmlshot-session".into())
            .spawn(move || {
                // Initialize engine on the worker thread
                let mut engine = match launcher.launch(&config) {
                    Ok(e) => e,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };

                let _ = init_tx.send(Ok(()));

                let mut page_open = true;

                // Command loop
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::SetContent(html, resp) => {
                            let res = if page_open { engine.set_content(&html) } else { Err(Error::SessionClosed) };
                            let _ = resp.send(res);
                        }
                        Command::WaitForSelector(selector, resp) => {
                            let res = if page_open { engine.wait_for_selector(&selector) } else { Err(Error::SessionClosed) };
                            let _ = resp.send(res);
                        }
                        Command::EvalInPage(script, resp) => {
                            let res = if page_open { engine.evaluate_script_in_page(&script) } else { Err(Error::SessionClosed) };
                            let _ = resp.send(res);
                        }
                        Command::SetViewport(viewport, resp) => {
                            let res = if page_open { engine.set_viewport(viewport) } else { Err(Error::SessionClosed) };
                            let _ = resp.send(res);
                        }
                        Command::Screenshot(resp) => {
                            let res = if page_open { engine.render_png() } else { Err(Error::SessionClosed) };
                            let _ = resp.send(res);
                        }
                        Command::ClosePage(resp) => {
                            let res = if page_open {
                                page_open = false;
                                engine.close_page()
                            } else {
                                Ok(())
                            };
                            let _ = resp.send(res);
                        }
                        Command::Close(resp) => {
                            let res = shutdown(engine.as_mut(), page_open);
                            let _ = resp.send(res);
                            return;
                        }
                    }
                }

                // Every handle went away without an explicit close.
                debug!("session handles dropped without close; releasing browser");
                if let Err(e) = shutdown(engine.as_mut(), page_open) {
                    warn!("Failed to release abandoned browser session: {}", e);
                }
            })
            .map_err(|e| Error::InitializationError(format!("Failed to spawn session worker: {}", e)))?;

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Open a page handle backed by the same worker thread.
    pub async fn new_page(&self) -> Result<Page> {
        Ok(Page {
            cmd_tx: self.cmd_tx.clone(),
        })
    }

    /// Shutdown the background worker and close the browser.
    pub async fn close(self) -> Result<()> {
        request(&self.cmd_tx, Command::Close, "Close").await
    }
}

impl Page {
    /// Replace the document with `html` and wait for it to load
    pub async fn set_content(&self, html: &str) -> Result<()> {
        request(&self.cmd_tx, |tx| Command::SetContent(html.to_string(), tx), "SetContent").await
    }

    /// Wait for `selector` to become visible; `false` means the wait timed out
    pub async fn wait_for_selector(&self, selector: &str) -> Result<bool> {
        request(&self.cmd_tx, |tx| Command::WaitForSelector(selector.to_string(), tx), "WaitForSelector").await
    }

    /// Evaluate script directly in the page's global context (can access `document` etc.)
    pub async fn eval_in_page(&self, script: &str) -> Result<String> {
        let sr = request(&self.cmd_tx, |tx| Command::EvalInPage(script.to_string(), tx), "EvalInPage").await?;
        if sr.is_error {
            return Err(Error::ScriptError(sr.value));
        }
        Ok(sr.value)
    }

    pub async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        request(&self.cmd_tx, |tx| Command::SetViewport(viewport, tx), "SetViewport").await
    }

    /// Take a full-page PNG screenshot
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        request(&self.cmd_tx, Command::Screenshot, "Screenshot").await
    }

    /// Close the page. The browser stays up until `Browser::close` (or drop).
    pub async fn close(self) -> Result<()> {
        request(&self.cmd_tx, Command::ClosePage, "ClosePage").await
    }
}

/// Send one command to the worker and wait for its reply.
async fn request<T>(
    cmd_tx: &Sender<Command>,
    make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    what: &str,
) -> Result<T> {
    let (tx, rx) = oneshot::channel();
    cmd_tx.send(make(tx)).map_err(|_| Error::SessionClosed)?;
    rx.await
        .map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))?
}

fn shutdown(engine: &mut dyn crate::Engine, page_open: bool) -> Result<()> {
    if page_open {
        if let Err(e) = engine.close_page() {
            warn!("Failed to close page before browser shutdown: {}", e);
        }
    }
    engine.close()
}
