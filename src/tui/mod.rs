mod ui;
mod widgets;

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::db::Database;
use crate::engine::{
    ExplicitSession, Input, ModeRouter, SessionStateMachine, StatisticsAggregator, StudyHost,
};
use crate::models::SessionSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Study,
    Summary,
    ResolutionError,
    UnsupportedMode,
}

/// What the study screen shows once the engine hands control back.
#[derive(Debug)]
pub struct HostState {
    pub view: View,
    pub summary: Option<SessionSummary>,
    pub message: Option<String>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            view: View::Study,
            summary: None,
            message: None,
        }
    }
}

impl StudyHost for HostState {
    fn on_complete(&mut self, summary: &SessionSummary) {
        self.summary = Some(summary.clone());
        self.view = View::Summary;
    }

    fn on_resolution_error(&mut self, message: &str) {
        self.message = Some(message.to_string());
        self.view = View::ResolutionError;
    }

    fn on_unsupported_mode(&mut self, message: &str) {
        self.message = Some(message.to_string());
        self.view = View::UnsupportedMode;
    }
}

pub type StudyMachine<'a> = SessionStateMachine<StatisticsAggregator<&'a Database>>;

pub struct App<'a> {
    router: ModeRouter<HostState>,
    machine: Option<StudyMachine<'a>>,
    pub should_quit: bool,
}

impl<'a> App<'a> {
    pub fn new(
        db: &'a Database,
        mode_id: &str,
        explicit: Option<ExplicitSession>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let sessions = db.list_sessions(None, true)?;
        let cards = db.list_cards()?;

        let mut router = ModeRouter::new(HostState::default());
        // A failed launch has already switched the host to its error view
        let machine = router
            .launch(mode_id, explicit, &sessions, &cards, |resolved| {
                StatisticsAggregator::new(db, resolved.cards())
            })
            .ok();

        Ok(Self {
            router,
            machine,
            should_quit: false,
        })
    }

    pub fn view(&self) -> View {
        self.router.host().view
    }

    pub fn host(&self) -> &HostState {
        self.router.host()
    }

    pub fn machine(&self) -> Option<&StudyMachine<'a>> {
        self.machine.as_ref()
    }

    /// Results of the finished session, as finalized by the engine.
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.machine
            .as_ref()
            .and_then(|m| m.summary())
            .or(self.router.host().summary.as_ref())
    }

    pub fn tick(&mut self, elapsed: Duration) {
        if let Some(machine) = self.machine.as_mut() {
            self.router.advance_clock(machine, elapsed);
        }
    }

    fn dispatch(&mut self, input: Input) {
        if let Some(machine) = self.machine.as_mut() {
            self.router.dispatch(machine, input);
        }
    }

    fn leave(&mut self) {
        if let Some(machine) = self.machine.as_mut() {
            machine.abandon();
        }
        self.should_quit = true;
    }

    fn handle_key(&mut self, key: KeyCode) {
        match self.view() {
            View::Study => match key {
                KeyCode::Char('q') | KeyCode::Esc => self.leave(),
                KeyCode::Char(' ') | KeyCode::Enter => self.dispatch(Input::Flip),
                KeyCode::Char('y') => self.dispatch(Input::Grade(true)),
                KeyCode::Char('n') => self.dispatch(Input::Grade(false)),
                KeyCode::Char(c @ '1'..='9') => {
                    let choice = (c as u8 - b'1') as usize;
                    self.dispatch(Input::Select(choice));
                }
                _ => {}
            },

            // Every other view offers a single way out
            View::Summary | View::ResolutionError | View::UnsupportedMode => match key {
                KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => self.leave(),
                _ => {}
            },
        }
    }
}

pub fn run(
    db: Database,
    mode_id: String,
    explicit: Option<ExplicitSession>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve before touching the terminal so store errors print normally
    let mut app = App::new(&db, &mode_id, explicit)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        let now = Instant::now();
        app.tick(now.duration_since(last_tick));
        last_tick = now;

        if app.should_quit {
            return Ok(());
        }
    }
}
