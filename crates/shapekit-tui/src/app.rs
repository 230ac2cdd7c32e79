use std::future::Future;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde_json::{json, Value};
use shapekit_core::chain::is_address;
use shapekit_core::chat::new_message_id;
use shapekit_core::mint::PendingSlot;
use shapekit_core::payloads::{
    CollectionAnalyticsData, CreatorAnalyticsData, ShapeNftData, StackAchievementsData, TopCreatorsData,
};
use shapekit_core::{
    apply_event, normalize, normalize_text, ChatErrorNotice, ChatMessage, ChatRole, ChatStatus, McpStatusResponse,
    McpTool, MintStatus, Network, PendingTransaction, RpcClient, StreamProgress, ToolOutcome, ToolResponse,
    UiStreamEvent, WalletClient,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::api::ApiClient;
use crate::cache::{
    with_retry, QueryCache, BALANCE_REFETCH, BALANCE_STALE, NFTS_STALE, READ_RETRIES, STATUS_REFETCH, STATUS_STALE,
};
use crate::tui::AppEvent;

const RETRY_DELAY: Duration = Duration::from_secs(1);
const STATUS_KEY: &str = "mcp-status";

pub const DEFAULT_TOP_CREATORS: u32 = 50;
pub const MAX_TOP_CREATORS: u32 = 100;
const SALES_HISTORY_LIMIT: u32 = 20;
/// Marketplace filters the collection tool understands.
pub const MARKETPLACES: [&str; 6] = ["seaport", "blur", "looksrare", "x2y2", "wyvern", "cryptopunks"];

pub struct Suggestion {
    pub title: &'static str,
    pub prompt: &'static str,
}

pub const SUGGESTED_PROMPTS: [Suggestion; 4] = [
    Suggestion {
        title: "Collection Analytics",
        prompt: "Give me data about the DeePle collection (0xf2e4b2a15872a20d0ffb336a89b94ba782ce9ba5)",
    },
    Suggestion {
        title: "Gasback Simulator",
        prompt: "How much gasback do I earn with 1000 tx / day for 6 months?",
    },
    Suggestion {
        title: "Shape Network Status & Information",
        prompt: "Get the current Shape Network status and RPC information",
    },
    Suggestion {
        title: "Mint SVG NFT",
        prompt: "Create an SVG NFT for me with a simple black circle design, name it \"My First Shape NFT\" and mint it to my wallet",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Nfts,
    Analytics,
    Greet,
}

impl Screen {
    pub const ALL: [Screen; 4] = [Screen::Chat, Screen::Nfts, Screen::Analytics, Screen::Greet];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Chat => "Chat",
            Screen::Nfts => "NFTs",
            Screen::Analytics => "Analytics",
            Screen::Greet => "Greet",
        }
    }

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let i = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Checking,
    Connected,
    Disconnected,
}

impl ServerStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ServerStatus::Checking => "Checking Server...",
            ServerStatus::Connected => "MCP Server Connected",
            ServerStatus::Disconnected => "MCP Server Disconnected (Check port 3002)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsKind {
    Creator,
    Collection,
    TopCreators,
    StackAchievements,
}

impl AnalyticsKind {
    pub const ALL: [AnalyticsKind; 4] = [
        AnalyticsKind::Creator,
        AnalyticsKind::Collection,
        AnalyticsKind::TopCreators,
        AnalyticsKind::StackAchievements,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AnalyticsKind::Creator => "Creator Analytics",
            AnalyticsKind::Collection => "Collection Analytics",
            AnalyticsKind::TopCreators => "Top Creators",
            AnalyticsKind::StackAchievements => "Stack Achievements",
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            AnalyticsKind::Creator => "getShapeCreatorAnalytics",
            AnalyticsKind::Collection => "getCollectionAnalytics",
            AnalyticsKind::TopCreators => "getTopShapeCreators",
            AnalyticsKind::StackAchievements => "getStackAchievements",
        }
    }

    pub fn input_label(&self) -> &'static str {
        match self {
            AnalyticsKind::Creator => "Creator address",
            AnalyticsKind::Collection => "Contract address [marketplace]",
            AnalyticsKind::TopCreators => "Number of creators [details]",
            AnalyticsKind::StackAchievements => "User address",
        }
    }

    /// Tool parameters for the text in the input box.
    ///
    /// Collection takes an address and an optional marketplace filter; Top
    /// Creators takes an optional count and the word `details` to ask for
    /// per-contract breakdowns.
    pub fn parameters(&self, input: &str) -> Result<Value, String> {
        let mut words = input.split_whitespace();
        let first = words.next().unwrap_or_default();
        let rest: Vec<&str> = words.collect();

        let address = |key: &str| {
            if is_address(first) {
                let mut params = serde_json::Map::new();
                params.insert(key.to_string(), Value::from(first));
                Ok(params)
            } else {
                Err("Please enter a valid address (0x followed by 40 hex characters)".to_string())
            }
        };

        match self {
            AnalyticsKind::Creator => address("creatorAddress").map(Value::Object),
            AnalyticsKind::StackAchievements => address("userAddress").map(Value::Object),
            AnalyticsKind::Collection => {
                let mut params = address("contractAddress")?;
                params.insert("includeFloorPrice".to_string(), Value::Bool(true));
                params.insert("includeSalesHistory".to_string(), Value::Bool(true));
                params.insert("salesHistoryLimit".to_string(), Value::from(SALES_HISTORY_LIMIT));
                match rest.as_slice() {
                    [] | ["all"] => {}
                    [market] if MARKETPLACES.contains(market) => {
                        params.insert("marketplace".to_string(), Value::from(*market));
                    }
                    _ => return Err(format!("Marketplace must be one of: {}", MARKETPLACES.join(", "))),
                }
                Ok(Value::Object(params))
            }
            AnalyticsKind::TopCreators => {
                let (count, details) = match (first, rest.as_slice()) {
                    ("", []) => (None, false),
                    ("details", []) => (None, true),
                    (n, []) => (Some(n), false),
                    (n, ["details"]) => (Some(n), true),
                    _ => return Err("Enter a number of creators, optionally followed by \"details\"".to_string()),
                };
                let limit = match count {
                    None => DEFAULT_TOP_CREATORS,
                    Some(n) => n
                        .parse::<u32>()
                        .ok()
                        .filter(|n| (1..=MAX_TOP_CREATORS).contains(n))
                        .ok_or_else(|| format!("Number of creators must be between 1 and {}", MAX_TOP_CREATORS))?,
                };
                Ok(json!({ "limit": limit, "includeContractDetails": details }))
            }
        }
    }

    fn next(self) -> Self {
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsView {
    Creator(CreatorAnalyticsData),
    Collection(CollectionAnalyticsData),
    TopCreators(TopCreatorsData),
    StackAchievements(StackAchievementsData),
}

impl AnalyticsView {
    fn decode(kind: AnalyticsKind, response: &ToolResponse) -> ToolOutcome<AnalyticsView> {
        match kind {
            AnalyticsKind::Creator => normalize(response).map(AnalyticsView::Creator),
            AnalyticsKind::Collection => normalize(response).map(AnalyticsView::Collection),
            AnalyticsKind::TopCreators => normalize(response).map(AnalyticsView::TopCreators),
            AnalyticsKind::StackAchievements => normalize(response).map(AnalyticsView::StackAchievements),
        }
    }
}

/// A panel's request state. `Failed` is a transport error, shown as an alert;
/// tool-level errors live inside `Done` as `ToolOutcome::SoftError`.
#[derive(Debug, Clone, PartialEq)]
pub enum Load<T> {
    Idle,
    Loading,
    Done(T),
    Failed(String),
}

impl<T> Load<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Load::Loading)
    }
}

#[derive(Debug, Clone)]
pub struct MintCard {
    pub transaction: PendingTransaction,
    pub status: MintStatus,
}

#[derive(Debug)]
pub enum NetEvent {
    Status(Result<McpStatusResponse, String>),
    Balance { address: String, result: Result<u128, String> },
    Nfts { address: String, result: Result<ToolResponse, String> },
    Analytics { kind: AnalyticsKind, result: Result<ToolResponse, String> },
    Greet(Result<ToolResponse, String>),
    Chat(UiStreamEvent),
    ChatEnded(Option<String>),
    Accounts(Result<Vec<String>, String>),
    /// `attempt` ties the result to the `App::mint` call that started it.
    MintSent { attempt: u64, result: Result<String, String> },
    MintConfirmed { attempt: u64, result: Result<String, String> },
    /// A background task panicked.
    Crashed(String),
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub fatal_error: Option<String>,
    pub animation_frame: u8,
    /// One-line message for the footer: wallet and transaction failures.
    pub notice: Option<String>,

    // Connections
    pub api: ApiClient,
    pub wallet_client: WalletClient,
    pub rpc: RpcClient,
    pub network: Network,
    events: UnboundedSender<AppEvent>,

    // Wallet
    pub wallet: Option<String>,
    /// Persist newly connected addresses to the settings file.
    pub remember_wallet: bool,
    pub balance: Option<u128>,
    balance_cache: QueryCache<u128>,
    last_balance_fetch: Option<Instant>,

    // Server status
    pub server_status: ServerStatus,
    pub available_tools: Vec<McpTool>,
    status_cache: QueryCache<McpStatusResponse>,
    last_status_fetch: Option<Instant>,

    // Chat
    pub chat_messages: Vec<ChatMessage>,
    pub chat_status: ChatStatus,
    pub chat_error: Option<ChatErrorNotice>,
    pub chat_input: String,
    pub chat_scroll: u16,
    pub pending: PendingSlot,
    pub mint_card: Option<MintCard>,
    mint_attempt: u64,

    // NFTs
    pub nfts: Load<ToolOutcome<ShapeNftData>>,
    nft_cache: QueryCache<ToolResponse>,

    // Analytics
    pub analytics_kind: AnalyticsKind,
    pub analytics_input: String,
    pub analytics: Load<ToolOutcome<AnalyticsView>>,

    // Greet
    pub greet_input: String,
    pub greet: Load<ToolOutcome<String>>,
}

impl App {
    pub fn new(
        api: ApiClient,
        wallet_client: WalletClient,
        rpc: RpcClient,
        network: Network,
        wallet: Option<String>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Normal,
            fatal_error: None,
            animation_frame: 0,
            notice: None,

            api,
            wallet_client,
            rpc,
            network,
            events,

            wallet,
            remember_wallet: false,
            balance: None,
            balance_cache: QueryCache::new(BALANCE_STALE),
            last_balance_fetch: None,

            server_status: ServerStatus::Checking,
            available_tools: Vec::new(),
            status_cache: QueryCache::new(STATUS_STALE),
            last_status_fetch: None,

            chat_messages: Vec::new(),
            chat_status: ChatStatus::Ready,
            chat_error: None,
            chat_input: String::new(),
            chat_scroll: 0,
            pending: PendingSlot::new(),
            mint_card: None,
            mint_attempt: 0,

            nfts: Load::Idle,
            nft_cache: QueryCache::new(NFTS_STALE),

            analytics_kind: AnalyticsKind::Creator,
            analytics_input: String::new(),
            analytics: Load::Idle,

            greet_input: String::new(),
            greet: Load::Idle,
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = NetEvent> + Send + 'static,
    {
        let tx = self.events.clone();
        tokio::spawn(async move {
            let event = match tokio::spawn(task).await {
                Ok(event) => event,
                Err(e) => NetEvent::Crashed(e.to_string()),
            };
            let _ = tx.send(AppEvent::Net(event));
        });
    }

    /// Called once when the UI starts.
    pub fn start(&mut self) {
        self.refresh_status(true);
        self.refresh_balance(true);
    }

    pub fn tick(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;

        let due = |last: Option<Instant>, every: Duration| last.map_or(true, |t| t.elapsed() >= every);
        if due(self.last_status_fetch, STATUS_REFETCH) {
            self.refresh_status(true);
        }
        if self.wallet.is_some() && due(self.last_balance_fetch, BALANCE_REFETCH) {
            self.refresh_balance(true);
        }
    }

    pub fn input_mut(&mut self) -> &mut String {
        match self.screen {
            Screen::Chat => &mut self.chat_input,
            Screen::Nfts | Screen::Greet => &mut self.greet_input,
            Screen::Analytics => &mut self.analytics_input,
        }
    }

    pub fn set_screen(&mut self, screen: Screen) {
        self.screen = screen;
        self.input_mode = InputMode::Normal;
        if screen == Screen::Nfts && self.nfts == Load::Idle {
            self.fetch_nfts(false);
        }
    }

    // Server status and wallet balance

    pub fn refresh_status(&mut self, force: bool) {
        if !force {
            if let Some(status) = self.status_cache.fresh(STATUS_KEY) {
                self.apply_status(status);
                return;
            }
        }
        self.last_status_fetch = Some(Instant::now());

        let api = self.api.clone();
        self.spawn(async move {
            let result = with_retry(READ_RETRIES, RETRY_DELAY, || api.status()).await;
            NetEvent::Status(result.map_err(|e| e.to_string()))
        });
    }

    pub fn apply_status(&mut self, status: McpStatusResponse) {
        self.server_status = if status.success {
            ServerStatus::Connected
        } else {
            ServerStatus::Disconnected
        };
        self.available_tools = status.available_tools.clone().unwrap_or_default();
        self.status_cache.insert(STATUS_KEY, status);
    }

    pub fn refresh_balance(&mut self, force: bool) {
        let Some(address) = self.wallet.clone() else {
            return;
        };
        if !force {
            if let Some(balance) = self.balance_cache.fresh(&address) {
                self.balance = Some(balance);
                return;
            }
        }
        self.last_balance_fetch = Some(Instant::now());

        let rpc = self.rpc.clone();
        self.spawn(async move {
            let result = with_retry(READ_RETRIES, RETRY_DELAY, || rpc.get_balance(&address)).await;
            NetEvent::Balance {
                address,
                result: result.map_err(|e| e.to_string()),
            }
        });
    }

    pub fn apply_balance(&mut self, address: &str, wei: u128) {
        self.balance_cache.insert(address, wei);
        if self.wallet.as_deref() == Some(address) {
            self.balance = Some(wei);
        }
    }

    pub fn connect_wallet(&mut self) {
        let wallet = self.wallet_client.clone();
        self.spawn(async move {
            NetEvent::Accounts(wallet.request_accounts().await.map_err(|e| e.to_string()))
        });
    }

    pub fn set_wallet(&mut self, address: String) {
        tracing::info!(%address, "wallet connected");
        self.notice = None;
        self.wallet = Some(address);
        self.balance = None;
        self.nfts = Load::Idle;
        self.refresh_balance(false);
        if self.screen == Screen::Nfts {
            self.fetch_nfts(false);
        }
    }

    /// `eth_requestAccounts` failed: tell the user, and mark a waiting mint card.
    pub fn wallet_failed(&mut self, reason: String) {
        tracing::warn!("wallet connection failed: {}", reason);
        if let Some(card) = self.mint_card.as_mut() {
            if card.status != MintStatus::Signing {
                card.status = MintStatus::Failed(reason.clone());
            }
        }
        self.notice = Some(format!("Wallet connection failed: {}", reason));
    }

    // NFT viewer

    pub fn fetch_nfts(&mut self, force: bool) {
        let Some(address) = self.wallet.clone() else {
            return;
        };
        if force {
            self.nft_cache.invalidate(&address);
        } else if let Some(response) = self.nft_cache.fresh(&address) {
            self.nfts = Load::Done(normalize(&response));
            return;
        }
        self.nfts = Load::Loading;

        let api = self.api.clone();
        self.spawn(async move {
            let params = json!({ "address": address, "withMetadata": true, "pageSize": 10 });
            let result = with_retry(READ_RETRIES, RETRY_DELAY, || api.call_tool("getShapeNft", params.clone())).await;
            NetEvent::Nfts {
                address,
                result: result.map_err(|e| e.to_string()),
            }
        });
    }

    pub fn apply_nfts(&mut self, address: &str, result: Result<ToolResponse, String>) {
        if self.wallet.as_deref() != Some(address) {
            return;
        }
        self.nfts = match result {
            Ok(response) => {
                let outcome = normalize(&response);
                if matches!(outcome, ToolOutcome::Ok(_)) {
                    self.nft_cache.insert(address, response);
                }
                Load::Done(outcome)
            }
            Err(e) => Load::Failed(e),
        };
    }

    // Analytics

    pub fn next_analytics(&mut self) {
        self.set_analytics_kind(self.analytics_kind.next());
    }

    pub fn prev_analytics(&mut self) {
        self.set_analytics_kind(self.analytics_kind.prev());
    }

    fn set_analytics_kind(&mut self, kind: AnalyticsKind) {
        self.analytics_kind = kind;
        self.analytics = Load::Idle;
        self.analytics_input = match kind {
            AnalyticsKind::Creator | AnalyticsKind::StackAchievements => self.wallet.clone().unwrap_or_default(),
            AnalyticsKind::Collection | AnalyticsKind::TopCreators => String::new(),
        };
    }

    pub fn run_analytics(&mut self) {
        if self.analytics.is_loading() {
            return;
        }
        let kind = self.analytics_kind;
        let params = match kind.parameters(&self.analytics_input) {
            Ok(params) => params,
            Err(message) => {
                self.analytics = Load::Done(ToolOutcome::SoftError(message));
                return;
            }
        };
        self.analytics = Load::Loading;

        let api = self.api.clone();
        self.spawn(async move {
            let result = with_retry(READ_RETRIES, RETRY_DELAY, || api.call_tool(kind.tool_name(), params.clone())).await;
            NetEvent::Analytics {
                kind,
                result: result.map_err(|e| e.to_string()),
            }
        });
    }

    pub fn apply_analytics(&mut self, kind: AnalyticsKind, result: Result<ToolResponse, String>) {
        if kind != self.analytics_kind {
            return;
        }
        self.analytics = match result {
            Ok(response) => Load::Done(AnalyticsView::decode(kind, &response)),
            Err(e) => Load::Failed(e),
        };
    }

    // Greet demo

    pub fn run_greet(&mut self) {
        let name = self.greet_input.trim().to_string();
        if name.is_empty() || self.greet.is_loading() {
            return;
        }
        self.greet = Load::Loading;

        let api = self.api.clone();
        self.spawn(async move {
            let result = api.call_tool("greet", json!({ "name": name })).await;
            NetEvent::Greet(result.map_err(|e| e.to_string()))
        });
    }

    pub fn apply_greet(&mut self, result: Result<ToolResponse, String>) {
        self.greet = match result {
            Ok(response) => Load::Done(normalize_text(&response)),
            Err(e) => Load::Failed(e),
        };
    }

    // Chat

    pub fn use_suggestion(&mut self, index: usize) {
        if let Some(suggestion) = SUGGESTED_PROMPTS.get(index) {
            self.chat_input = suggestion.prompt.to_string();
            self.input_mode = InputMode::Editing;
        }
    }

    /// Send the input box as a new user message. Returns `false` when nothing
    /// was sent: no wallet, empty input, or a request already in flight.
    pub fn submit_chat(&mut self) -> bool {
        if self.wallet.is_none() || !self.chat_status.accepts_input() {
            return false;
        }
        let text = self.chat_input.trim().to_string();
        if text.is_empty() {
            return false;
        }

        self.chat_input.clear();
        self.chat_error = None;
        self.chat_messages.push(ChatMessage::user(&text));
        let history = self.chat_messages.clone();
        self.chat_messages.push(ChatMessage::assistant(&new_message_id()));
        self.chat_status = ChatStatus::Submitted;
        self.scroll_chat_to_bottom();

        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let failure = match api.chat_stream(&history).await {
                Ok(mut events) => {
                    let mut failure = None;
                    while let Some(event) = events.next().await {
                        match event {
                            Ok(event) => {
                                if tx.send(AppEvent::Net(NetEvent::Chat(event))).is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                failure = Some(e.to_string());
                                break;
                            }
                        }
                    }
                    failure
                }
                Err(e) => Some(e.to_string()),
            };
            let _ = tx.send(AppEvent::Net(NetEvent::ChatEnded(failure)));
        });
        true
    }

    pub fn apply_chat_event(&mut self, event: UiStreamEvent) {
        if !self.chat_status.is_busy() {
            return;
        }
        self.chat_status = ChatStatus::Streaming;

        let Some(message) = self.chat_messages.last_mut().filter(|m| m.role == ChatRole::Assistant) else {
            return;
        };
        match apply_event(message, event) {
            StreamProgress::Continue => {}
            StreamProgress::Finished => self.finish_chat(None),
            StreamProgress::Failed(error) => self.finish_chat(Some(error)),
        }
        self.scroll_chat_to_bottom();
    }

    /// Settle the in-flight request and look for a mint in the finished answer.
    pub fn finish_chat(&mut self, failure: Option<String>) {
        if !self.chat_status.is_busy() {
            return;
        }

        match failure {
            Some(error) => {
                tracing::warn!("chat request failed: {}", error);
                self.chat_status = ChatStatus::Error;
                self.chat_error = Some(ChatErrorNotice::from_message(&error));
            }
            None => self.chat_status = ChatStatus::Ready,
        }

        // Only the latest answer: earlier ones may hold mints already handled.
        if let Some(last) = self.chat_messages.last() {
            if self.pending.scan(std::slice::from_ref(last)) {
                if let Some(transaction) = self.pending.current().cloned() {
                    self.mint_card = Some(MintCard {
                        transaction,
                        status: MintStatus::Ready,
                    });
                }
            }
        }
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        let lines: usize = self
            .chat_messages
            .iter()
            .map(|m| 2 + m.text_content().lines().count() + m.tool_parts().count())
            .sum();
        self.chat_scroll = lines.saturating_sub(10) as u16;
    }

    // Mint

    pub fn mint(&mut self) {
        let Some(card) = self.mint_card.as_mut() else {
            return;
        };
        if matches!(card.status, MintStatus::Signing | MintStatus::Confirmed(_)) {
            return;
        }
        let Some(from) = self.wallet.clone() else {
            card.status = MintStatus::Failed("Please connect your wallet first".to_string());
            return;
        };
        card.status = MintStatus::Signing;
        self.notice = None;
        self.mint_attempt += 1;
        let attempt = self.mint_attempt;

        let transaction = card.transaction.clone();
        let wallet = self.wallet_client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let hash = match wallet.send_mint(Some(&from), &transaction).await {
                Ok(hash) => hash,
                Err(e) => {
                    let result = Err(e.to_string());
                    let _ = tx.send(AppEvent::Net(NetEvent::MintSent { attempt, result }));
                    return;
                }
            };
            let sent = NetEvent::MintSent { attempt, result: Ok(hash.clone()) };
            if tx.send(AppEvent::Net(sent)).is_err() {
                return;
            }
            let result = wallet
                .wait_for_receipt(&hash)
                .await
                .map(|receipt| receipt.transaction_hash)
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::Net(NetEvent::MintConfirmed { attempt, result }));
        });
    }

    /// Settle the signing card. Results from any other attempt are dropped.
    ///
    /// A failed transaction clears the card together with the pending slot,
    /// so the next answer carrying a mint starts over.
    pub fn apply_mint_result(&mut self, attempt: u64, result: Result<String, String>) {
        let signing = self
            .mint_card
            .as_ref()
            .is_some_and(|card| card.status == MintStatus::Signing);
        if !signing || attempt != self.mint_attempt {
            tracing::debug!(attempt, current = self.mint_attempt, "ignoring stale mint result");
            return;
        }
        match result {
            Ok(hash) => {
                self.pending.complete(&hash);
                if let Some(card) = self.mint_card.as_mut() {
                    card.status = MintStatus::Confirmed(hash);
                }
            }
            Err(reason) => {
                self.pending.fail(&reason);
                self.mint_card = None;
                self.notice = Some(format!("Transaction failed: {}", reason));
            }
        }
    }

    pub fn dismiss_mint(&mut self) {
        if let Some(card) = &self.mint_card {
            if card.status == MintStatus::Signing {
                return;
            }
        }
        self.mint_card = None;
        self.pending = PendingSlot::new();
    }

    pub fn explorer_link(&self) -> Option<String> {
        match &self.mint_card.as_ref()?.status {
            MintStatus::Confirmed(hash) => Some(self.network.explorer_tx_url(hash)),
            _ => None,
        }
    }

    /// Show the error screen.
    pub fn set_fatal(&mut self, message: String) {
        tracing::error!("{}", message);
        self.input_mode = InputMode::Normal;
        self.fatal_error = Some(message);
    }

    /// Recover from the error screen: drop panel state and refetch.
    pub fn reset(&mut self) {
        self.fatal_error = None;
        self.notice = None;
        self.input_mode = InputMode::Normal;
        self.status_cache.clear();
        self.nft_cache.clear();
        self.balance_cache.clear();
        self.nfts = Load::Idle;
        self.analytics = Load::Idle;
        self.greet = Load::Idle;
        self.chat_error = None;
        if !self.chat_status.is_busy() {
            self.chat_status = ChatStatus::Ready;
        }
        self.refresh_status(true);
        self.refresh_balance(true);
        if self.screen == Screen::Nfts {
            self.fetch_nfts(true);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::app;
    use super::*;
    use shapekit_core::ToolContent;

    const WALLET: &str = "0x2222222222222222222222222222222222222222";

    fn mint_text() -> String {
        mint_text_for("ipfs://abc")
    }

    fn mint_text_for(token_uri: &str) -> String {
        format!(
            "Here you go:\n```json\n{}\n```",
            json!({
                "success": true,
                "transaction": {"to": "0x1111111111111111111111111111111111111111"},
                "metadata": {
                    "functionName": "mintNFT",
                    "recipientAddress": WALLET,
                    "contractAddress": "0x1111111111111111111111111111111111111111",
                    "tokenURI": token_uri,
                    "chainId": 11011
                }
            })
        )
    }

    #[test]
    fn test_screen_cycle() {
        assert_eq!(Screen::Chat.next(), Screen::Nfts);
        assert_eq!(Screen::Chat.prev(), Screen::Greet);
    }

    #[test]
    fn test_analytics_parameters() {
        assert_eq!(
            AnalyticsKind::Creator.parameters(WALLET).unwrap(),
            json!({"creatorAddress": WALLET})
        );
        assert_eq!(
            AnalyticsKind::TopCreators.parameters("").unwrap(),
            json!({"limit": 50, "includeContractDetails": false})
        );
        assert_eq!(
            AnalyticsKind::TopCreators.parameters("100 details").unwrap(),
            json!({"limit": 100, "includeContractDetails": true})
        );
        assert!(AnalyticsKind::Collection.parameters("0x12").is_err());
        assert!(AnalyticsKind::TopCreators.parameters("101").is_err());
        assert!(AnalyticsKind::TopCreators.parameters("0").is_err());
    }

    #[test]
    fn test_collection_parameters_carry_sales_options() {
        assert_eq!(
            AnalyticsKind::Collection.parameters(WALLET).unwrap(),
            json!({
                "contractAddress": WALLET,
                "includeFloorPrice": true,
                "includeSalesHistory": true,
                "salesHistoryLimit": 20
            })
        );
        let filtered = AnalyticsKind::Collection.parameters(&format!("{} blur", WALLET)).unwrap();
        assert_eq!(filtered["marketplace"], "blur");
        let all = AnalyticsKind::Collection.parameters(&format!("{} all", WALLET)).unwrap();
        assert!(all.get("marketplace").is_none());
        assert!(AnalyticsKind::Collection.parameters(&format!("{} ebay", WALLET)).is_err());
    }

    #[tokio::test]
    async fn test_submit_without_wallet_does_nothing() {
        let (mut app, mut rx) = app(None);
        app.chat_input = "hello".to_string();

        assert!(!app.submit_chat());
        assert!(app.chat_messages.is_empty());
        assert_eq!(app.chat_status, ChatStatus::Ready);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_busy_chat_rejects_input() {
        let (mut app, _rx) = app(Some(WALLET));
        app.chat_input = "first".to_string();
        assert!(app.submit_chat());
        assert_eq!(app.chat_status, ChatStatus::Submitted);

        app.chat_input = "second".to_string();
        assert!(!app.submit_chat());
        assert_eq!(app.chat_messages.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_events_build_answer() {
        let (mut app, _rx) = app(Some(WALLET));
        app.chat_input = "hi".to_string();
        app.submit_chat();

        app.apply_chat_event(UiStreamEvent::TextStart { id: "t".to_string() });
        assert_eq!(app.chat_status, ChatStatus::Streaming);
        app.apply_chat_event(UiStreamEvent::TextDelta { id: "t".to_string(), delta: "Hello".to_string() });
        app.apply_chat_event(UiStreamEvent::Finish);

        assert_eq!(app.chat_status, ChatStatus::Ready);
        assert_eq!(app.chat_messages[1].text_content(), "Hello");

        // A late end-of-stream must not flip the settled status.
        app.finish_chat(Some("boom".to_string()));
        assert_eq!(app.chat_status, ChatStatus::Ready);
    }

    #[tokio::test]
    async fn test_rate_limit_notice() {
        let (mut app, _rx) = app(Some(WALLET));
        app.chat_input = "hi".to_string();
        app.submit_chat();
        app.finish_chat(Some("HTTP error! status: 429 (rate limit exceeded)".to_string()));

        assert_eq!(app.chat_status, ChatStatus::Error);
        let notice = app.chat_error.as_ref().unwrap();
        assert!(notice.rate_limited);
        assert_eq!(notice.title, "Rate Limit Exceeded");
        assert!(app.chat_status.accepts_input());
    }

    #[tokio::test]
    async fn test_mint_detected_once() {
        let (mut app, _rx) = app(Some(WALLET));
        app.chat_input = "mint".to_string();
        app.submit_chat();
        app.apply_chat_event(UiStreamEvent::TextDelta { id: "t".to_string(), delta: mint_text() });
        app.apply_chat_event(UiStreamEvent::Finish);

        let card = app.mint_card.as_ref().unwrap();
        assert_eq!(card.status, MintStatus::Ready);
        assert_eq!(card.transaction.metadata.token_uri, "ipfs://abc");

        app.mint();
        assert_eq!(app.mint_card.as_ref().unwrap().status, MintStatus::Signing);
        app.apply_mint_result(1, Ok("0xfeed".to_string()));
        assert!(!app.pending.is_occupied());
        assert_eq!(
            app.explorer_link().as_deref(),
            Some("https://sepolia.shapescan.xyz/tx/0xfeed")
        );

        // The next answer has no mint, so the handled one is not picked up again.
        app.dismiss_mint();
        app.chat_input = "thanks".to_string();
        app.submit_chat();
        app.apply_chat_event(UiStreamEvent::TextDelta { id: "t".to_string(), delta: "You're welcome".to_string() });
        app.apply_chat_event(UiStreamEvent::Finish);
        assert!(app.mint_card.is_none());
    }

    /// One full assistant answer with `text` as its body.
    fn answer(app: &mut App, text: &str) {
        app.chat_input = "mint".to_string();
        assert!(app.submit_chat());
        app.apply_chat_event(UiStreamEvent::TextDelta { id: "t".to_string(), delta: text.to_string() });
        app.apply_chat_event(UiStreamEvent::Finish);
    }

    fn card_uri(app: &App) -> Option<&str> {
        app.mint_card.as_ref().map(|card| card.transaction.metadata.token_uri.as_str())
    }

    #[tokio::test]
    async fn test_failed_mint_clears_card_and_slot() {
        let (mut app, _rx) = app(Some(WALLET));
        answer(&mut app, &mint_text_for("ipfs://first"));
        app.mint();
        app.apply_mint_result(1, Err("user rejected".to_string()));

        assert!(app.mint_card.is_none());
        assert!(!app.pending.is_occupied());
        assert_eq!(app.notice.as_deref(), Some("Transaction failed: user rejected"));

        // Nothing left to resend.
        app.mint();
        assert!(app.mint_card.is_none());
    }

    #[tokio::test]
    async fn test_signing_card_is_not_replaced() {
        let (mut app, _rx) = app(Some(WALLET));
        answer(&mut app, &mint_text_for("ipfs://first"));
        app.mint();
        app.apply_mint_result(1, Err("user rejected".to_string()));

        answer(&mut app, &mint_text_for("ipfs://second"));
        app.mint();
        assert!(app.pending.is_occupied());

        answer(&mut app, &mint_text_for("ipfs://third"));
        assert_eq!(card_uri(&app), Some("ipfs://second"));
        assert_eq!(app.mint_card.as_ref().unwrap().status, MintStatus::Signing);

        // A late result from the first attempt settles nothing.
        app.apply_mint_result(1, Ok("0xfirst".to_string()));
        assert_eq!(app.mint_card.as_ref().unwrap().status, MintStatus::Signing);

        app.apply_mint_result(2, Ok("0xsecond".to_string()));
        assert_eq!(card_uri(&app), Some("ipfs://second"));
        assert_eq!(
            app.mint_card.as_ref().unwrap().status,
            MintStatus::Confirmed("0xsecond".to_string())
        );
    }

    #[tokio::test]
    async fn test_mint_result_without_signing_is_ignored() {
        let (mut app, _rx) = app(Some(WALLET));
        answer(&mut app, &mint_text());
        app.apply_mint_result(0, Ok("0xfeed".to_string()));
        assert_eq!(app.mint_card.as_ref().unwrap().status, MintStatus::Ready);
        assert!(app.pending.is_occupied());
    }

    #[tokio::test]
    async fn test_analytics_waits_for_running_request() {
        let (mut app, _rx) = app(None);
        app.analytics_kind = AnalyticsKind::TopCreators;
        app.run_analytics();
        assert!(app.analytics.is_loading());

        // A second run would have rejected this input had it gone through.
        app.analytics_input = "oops".to_string();
        app.run_analytics();
        assert_eq!(app.analytics, Load::Loading);
    }

    #[tokio::test]
    async fn test_nft_results_for_old_wallet_are_dropped() {
        let (mut app, _rx) = app(Some(WALLET));
        let response = ToolResponse::ok("getShapeNft", vec![ToolContent::text("{}")]);

        app.apply_nfts("0x3333333333333333333333333333333333333333", Ok(response));
        assert_eq!(app.nfts, Load::Idle);
    }

    #[tokio::test]
    async fn test_greet_round_trip() {
        use axum::routing::post;
        use axum::{Json, Router};

        let router = Router::new().route(
            "/api/call-mcp-tool",
            post(|Json(body): Json<Value>| async move {
                let name = body["parameters"]["name"].as_str().unwrap_or_default().to_string();
                Json(json!({
                    "success": true,
                    "result": {"content": [{"type": "text", "text": format!("Hello, {}!", name)}]}
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let (mut app, mut rx) = super::test_support::app_with_server(&url, None);
        app.greet_input = "  Ada ".to_string();
        app.run_greet();

        match rx.recv().await {
            Some(AppEvent::Net(NetEvent::Greet(result))) => app.apply_greet(result),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(app.greet, Load::Done(ToolOutcome::Ok("Hello, Ada!".to_string())));
    }

    #[tokio::test]
    async fn test_greet_soft_error() {
        let (mut app, _rx) = app(None);
        app.apply_greet(Ok(ToolResponse::failed(Some("greet"), "Unknown tool")));
        assert_eq!(app.greet, Load::Done(ToolOutcome::SoftError("Unknown tool".to_string())));
    }
}
