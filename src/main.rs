use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use color_eyre::{Result, eyre::WrapErr};
use crossterm::event::{Event, EventStream, KeyCode, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Clear, Paragraph, Wrap},
};
use throbber_widgets_tui::{BRAILLE_SIX, Throbber, ThrobberState};
use tokio_stream::StreamExt;

use mongomate::{
    browse::{BrowseSettings, PageSize, settings},
    store::{ConnectOptions, DocumentStore, MongoStore, mongo, redact_uri},
};

mod env;
mod help;
mod logging;
mod subcommands;
mod util;
mod widgets;

use env::{AppEvent, Env, Message, Toast, ToastKind};
use widgets::{NamespacePicker, Popup, Widget, theme::Theme};

#[derive(clap::Parser)]
#[command(
    name = "mongomate",
    version,
    about = "Browse and edit MongoDB collections from the terminal",
    long_about = None
)]
struct Cli {
    /// Increase output verbosity (-v, -vv, etc.)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// MongoDB connection string
    #[arg(long, global = true, env = "MONGOMATE_URI", default_value = mongo::DEFAULT_URI)]
    uri: String,

    /// Talk to the given host only instead of discovering the topology
    #[arg(long, global = true, default_value_t = true, action = clap::ArgAction::Set)]
    direct_connection: bool,

    /// Give up on server selection after this many milliseconds
    #[arg(long, global = true, default_value_t = 5000)]
    server_timeout_ms: u64,

    /// Documents per page
    #[arg(long, global = true, env = "MONGOMATE_PAGE_SIZE", default_value_t = settings::DEFAULT_PAGE_SIZE)]
    page_size: u64,

    /// Maximum display width of a table cell before it is cut
    #[arg(long, global = true, env = "MONGOMATE_CELL_WIDTH", default_value_t = settings::DEFAULT_CELL_WIDTH)]
    cell_width: usize,

    /// Field always edited as structured text (repeatable)
    #[arg(
        long = "structured-field",
        global = true,
        env = "MONGOMATE_STRUCTURED_FIELDS",
        value_delimiter = ',',
        value_name = "FIELD"
    )]
    structured_fields: Vec<String>,

    /// Field that identifies documents
    #[arg(long, global = true, default_value = settings::DEFAULT_ID_FIELD)]
    id_field: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            uri: self.uri.clone(),
            direct_connection: self.direct_connection,
            server_timeout: Duration::from_millis(self.server_timeout_ms),
        }
    }

    fn browse_settings(&self) -> Result<BrowseSettings> {
        PageSize::new(self.page_size).wrap_err("invalid --page-size")?;
        Ok(BrowseSettings::default()
            .with_id_field(self.id_field.clone())
            .with_page_size(self.page_size)
            .with_cell_width(self.cell_width)
            .with_structured_fields(self.structured_fields.iter().map(|field| field.trim())))
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List database names
    ListDatabases {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// List collection names in a database
    ListCollections {
        /// Database name
        database: String,

        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// Print one page of a collection
    Find(subcommands::find::Args),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = <Cli as clap::Parser>::parse();

    let log_target = match cli.command {
        Some(_) => logging::LogTarget::Stderr,
        None => logging::LogTarget::File(logging::default_log_file()?),
    };
    logging::init(cli.verbose, &log_target)?;

    let settings = Arc::new(cli.browse_settings()?);
    let options = cli.connect_options();
    let store = MongoStore::connect(&options)
        .await
        .wrap_err_with(|| format!("connecting to {}", redact_uri(&options.uri)))?;
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    match cli.command {
        Some(Commands::ListDatabases { json }) => {
            let options = subcommands::list_databases::Options { json };
            subcommands::list_databases::command(store.as_ref(), options).await
        }
        Some(Commands::ListCollections { database, json }) => {
            let options = subcommands::list_collections::Options { database, json };
            subcommands::list_collections::command(store.as_ref(), options).await
        }
        Some(Commands::Find(args)) => subcommands::find::command(store, settings, args).await,
        None => {
            tracing::info!(uri = %redact_uri(&options.uri), "Starting TUI");
            App::new().run_tui(store, settings).await
        }
    }
}

struct App {
    env: Env,
    widgets: Vec<Box<dyn Widget>>,
    popup: Option<Box<dyn Popup>>,
    toast: Option<(Toast, Instant)>,
    theme: Theme,
    throbber: ThrobberState,
    frame_count: u64,
    should_quit: bool,
    needs_clear: bool,
}

impl App {
    const FRAMES_PER_SECOND: f32 = 30.0;
    const THROBBER_EVERY: u64 = 3;
    const GLOBAL_HELP: &'static [help::Entry] = &[
        help::Entry::new("?", "help", "Show help"),
        help::Entry::new("q", "quit", "Quit"),
    ];

    fn new() -> Self {
        Self {
            env: Env::new(),
            widgets: Vec::new(),
            popup: None,
            toast: None,
            theme: Theme::detect(),
            throbber: ThrobberState::default(),
            frame_count: 0,
            should_quit: false,
            needs_clear: false,
        }
    }

    async fn run_tui(self, store: Arc<dyn DocumentStore>, settings: Arc<BrowseSettings>) -> Result<()> {
        let terminal = ratatui::init();
        let app_result = self.run(terminal, store, settings).await;
        ratatui::restore();
        app_result
    }

    async fn run(
        mut self,
        mut terminal: DefaultTerminal,
        store: Arc<dyn DocumentStore>,
        settings: Arc<BrowseSettings>,
    ) -> Result<()> {
        self.push_widget(Box::new(NamespacePicker::new(store, settings)));

        let period = Duration::from_secs_f32(1.0 / Self::FRAMES_PER_SECOND);
        let mut interval = tokio::time::interval(period);
        let mut events = EventStream::new();

        while !self.should_quit {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                    if self.needs_clear {
                        terminal.clear()?;
                        self.needs_clear = false;
                    }
                    terminal.draw(|frame| self.render(frame))?;
                },
                Some(event) = events.next() => {
                    let event = event.wrap_err("reading terminal events")?;
                    self.handle_event(&event);
                },
                Some(message) = self.env.rx().recv() => self.handle_message(message),
            }
        }
        Ok(())
    }

    fn tick(&mut self) {
        self.frame_count += 1;
        if self.frame_count % Self::THROBBER_EVERY == 0 {
            self.throbber.calc_next();
        }
        if let Some((toast, shown_at)) = self.toast.as_ref()
            && shown_at.elapsed() >= toast.duration
        {
            self.toast = None;
        }
    }

    fn push_widget(&mut self, widget: Box<dyn Widget>) {
        widget.start(self.env.ctx(widget.id()));
        self.widgets.push(widget);
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Invalidate => {}
            Message::ForceRedraw => self.needs_clear = true,
            Message::PushWidget(widget) => self.push_widget(widget),
            Message::PopWidget => {
                self.widgets.pop();
                self.popup = None;
                if self.widgets.is_empty() {
                    self.should_quit = true;
                }
            }
            Message::SetPopup(popup) => {
                tracing::trace!(
                    popup = ?popup.id(),
                    parent = ?popup.inner().parent(),
                    "Showing popup"
                );
                popup.start(self.env.ctx(popup.id()));
                self.popup = Some(popup);
            }
            Message::DismissPopup => self.popup = None,
            Message::ShowToast(toast) => self.toast = Some((toast, Instant::now())),
            Message::Emit(event) => self.deliver(event),
            Message::Quit => self.should_quit = true,
        }
    }

    fn deliver(&self, event: AppEvent) {
        let target = event.target();
        let ctx = self.env.ctx(target);
        if let Some(popup) = self.popup.as_ref()
            && popup.id() == target
        {
            popup.on_self_event(ctx, &event);
            return;
        }
        match self.widgets.iter().rev().find(|widget| widget.id() == target) {
            Some(widget) => widget.on_self_event(ctx, &event),
            None => tracing::debug!(?target, "Dropping event for closed widget"),
        }
    }

    fn handle_event(&mut self, event: &Event) {
        if let Some(key) = event.as_key_press_event()
            && key.code == KeyCode::Char('c')
            && key.modifiers.contains(KeyModifiers::CONTROL)
        {
            self.should_quit = true;
            return;
        }
        if let Some(popup) = self.popup.as_ref() {
            popup.handle_event(self.env.ctx(popup.id()), event);
            return;
        }
        if let Some(widget) = self.widgets.last()
            && widget.handle_event(self.env.ctx(widget.id()), event)
        {
            return;
        }
        if let Some(key) = event.as_key_press_event() {
            match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('?') => self.show_help(),
                _ => {}
            }
        }
    }

    fn show_help(&mut self) {
        let Some(widget) = self.widgets.last() else {
            return;
        };
        let mut entries = widget.help().map(<[_]>::to_vec).unwrap_or_default();
        entries.extend_from_slice(Self::GLOBAL_HELP);
        let popup = help::HelpPopup::new(entries, widget.id());
        self.popup = Some(Box::new(popup));
    }

    fn footer_entries(&self) -> Vec<help::Entry> {
        if let Some(popup) = self.popup.as_ref() {
            return popup.help().map(<[_]>::to_vec).unwrap_or_default();
        }
        let mut entries = self
            .widgets
            .last()
            .and_then(|widget| widget.help())
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        entries.extend_from_slice(Self::GLOBAL_HELP);
        entries
    }

    fn render(&mut self, frame: &mut Frame) {
        let theme = self.theme;
        let area = frame.area();
        frame.render_widget(Block::new().style(Style::default().bg(theme.bg())), area);

        let entries = self.footer_entries();
        let footer_height = help::height(&entries, area, &theme).max(1);
        let layout = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(footer_height),
        ]);
        let [title_area, body_area, footer_area] = area.layout(&layout);

        self.render_title(frame, title_area);
        if let Some(widget) = self.widgets.last() {
            widget.render(frame, body_area, &theme);
        }
        if let Some(popup) = self.popup.as_ref() {
            let popup_area = popup.rect(body_area);
            frame.render_widget(Clear, popup_area);
            popup.render(frame, popup_area, &theme);
        }
        if let Some((toast, _)) = self.toast.as_ref() {
            render_toast(frame, body_area, toast, &theme);
        }
        help::render(&entries, frame, footer_area, &theme);
    }

    fn render_title(&mut self, frame: &mut Frame, area: Rect) {
        let theme = self.theme;
        let mut spans = vec![Span::styled(
            " mongomate ",
            Style::default()
                .fg(theme.accent())
                .add_modifier(Modifier::BOLD),
        )];
        for title in self.widgets.iter().filter_map(|widget| widget.navigation_title()) {
            spans.push(Span::styled("› ", Style::default().fg(theme.text_muted())));
            spans.push(Span::styled(
                format!("{title} "),
                Style::default().fg(theme.text()),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);

        let loading = self.widgets.last().is_some_and(|widget| widget.is_loading());
        if loading {
            let width = 12.min(area.width);
            let throbber_area = Rect {
                x: area.right() - width,
                width,
                ..area
            };
            let throbber = Throbber::default()
                .label("working")
                .style(Style::default().fg(theme.text_muted()))
                .throbber_style(Style::default().fg(theme.accent()))
                .throbber_set(BRAILLE_SIX);
            frame.render_stateful_widget(throbber, throbber_area, &mut self.throbber);
        }
    }
}

fn render_toast(frame: &mut Frame, area: Rect, toast: &Toast, theme: &Theme) {
    let color = match toast.kind {
        ToastKind::Info => theme.success(),
        ToastKind::Warning => theme.warning(),
        ToastKind::Error => theme.error(),
    };
    let width = (toast.message.chars().count() as u16 + 4)
        .min(area.width.saturating_sub(2))
        .max(10);
    let inner_width = width.saturating_sub(4).max(1) as usize;
    let lines = toast.message.chars().count().div_ceil(inner_width).max(1) as u16;
    let height = (lines + 2).min(area.height);
    let toast_area = Rect {
        x: area.right().saturating_sub(width + 1),
        y: area.bottom().saturating_sub(height + 1),
        width: width.min(area.width),
        height,
    };
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
        .style(Style::default().bg(theme.panel_bg()).fg(theme.text()));
    let paragraph = Paragraph::new(toast.message.as_str())
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(Clear, toast_area);
    frame.render_widget(paragraph, toast_area);
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn structured_fields_split_on_commas() {
        let cli = Cli::try_parse_from([
            "mongomate",
            "--structured-field",
            "payload, attrs",
            "--structured-field",
            "extra",
            "list-databases",
        ])
        .unwrap();
        let settings = cli.browse_settings().unwrap();
        assert!(settings.is_structured_field("payload"));
        assert!(settings.is_structured_field("attrs"));
        assert!(settings.is_structured_field("extra"));
    }

    #[test]
    fn direct_connection_can_be_disabled() {
        let cli = Cli::try_parse_from(["mongomate", "--direct-connection", "false"]).unwrap();
        let options = cli.connect_options();
        assert!(!options.direct_connection);
        assert_eq!(options.server_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn oversized_page_size_is_rejected() {
        let cli = Cli::try_parse_from(["mongomate", "--page-size", "5000"]).unwrap();
        assert!(cli.browse_settings().is_err());
    }

    #[test]
    fn find_requires_sort_for_desc() {
        assert!(Cli::try_parse_from(["mongomate", "find", "db", "coll", "--desc"]).is_err());
        assert!(
            Cli::try_parse_from(["mongomate", "find", "db", "coll", "--sort", "n", "--desc"])
                .is_ok()
        );
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
