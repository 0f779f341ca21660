use std::{fs, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use storefront_orders::{
    client::{ClientConfig, ReturnAttachment, StorefrontClient},
    config,
    models::{OrderItem, PaymentMethod, ViewerRole},
    services::{
        orders::CheckoutRequest,
        payments::{sign_gateway_payment, GatewayOrder},
    },
    storefront::{
        advance, CheckoutGateway, CheckoutOutcome, Notifier, OrderView, PaymentRetryFlow,
    },
};
use tracing::debug;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_tracing(if cli.verbose { "debug" } else { "warn" }, false);

    let client = cli.connection.client()?;
    let notifier = ConsoleNotifier { quiet: cli.json };

    match cli.command {
        Commands::Orders(command) => handle_orders_command(&client, &notifier, command, cli.json).await?,
        Commands::Wallet(command) => handle_wallet_command(&client, command, cli.json).await?,
        Commands::Coupons => {
            let coupons = client.coupons().await.context("failed to fetch coupons")?;
            if cli.json {
                print_json(&coupons)?;
            } else if coupons.is_empty() {
                println!("No coupons on offer");
            } else {
                for coupon in coupons {
                    println!(
                        "{:<12} {:<10} {:>8}  min {}  {}",
                        coupon.code,
                        coupon.discount_type,
                        coupon.discount_value,
                        coupon.min_amount,
                        coupon.description.unwrap_or_default()
                    );
                }
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "storefront", about = "Storefront order and payment CLI", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[arg(long, global = true, action = ArgAction::SetTrue, help = "Log requests")]
    verbose: bool,
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    base_url: String,
    #[arg(long = "user", global = true, default_value = "demo-user")]
    user_id: String,
    #[arg(long, global = true, action = ArgAction::SetTrue, help = "Act as an administrator")]
    admin: bool,
    #[arg(long, global = true, help = "Override the JSON request timeout (seconds)")]
    timeout_secs: Option<u64>,
}

impl ConnectionArgs {
    fn client(&self) -> Result<StorefrontClient> {
        let role = if self.admin {
            ViewerRole::Admin
        } else {
            ViewerRole::User
        };
        let mut config = ClientConfig::new(self.base_url.clone(), self.user_id.clone(), role);
        if let Some(secs) = self.timeout_secs {
            config.json_timeout = Duration::from_secs(secs);
        }
        StorefrontClient::new(config).context("failed to build HTTP client")
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Orders(OrdersCommands),
    #[command(subcommand)]
    Wallet(WalletCommands),
    /// List coupons currently on offer
    Coupons,
}

#[derive(Subcommand)]
enum OrdersCommands {
    /// List orders (all orders with --admin)
    List,
    Get(OrderIdArgs),
    /// Place an order
    Place(PlaceOrderArgs),
    Cancel(CancelArgs),
    /// Request a return for a delivered order
    Return(ReturnArgs),
    /// Retry a failed payment
    RetryPayment(RetryPaymentArgs),
    /// Advance an order to its next status (admin)
    Advance(OrderIdArgs),
}

#[derive(Subcommand)]
enum WalletCommands {
    Show,
    /// Top up a user's wallet (admin)
    Credit(CreditArgs),
}

#[derive(Args)]
struct OrderIdArgs {
    id: Uuid,
}

#[derive(Args)]
struct PlaceOrderArgs {
    /// `sku:quantity:price[:name]`, repeatable
    #[arg(long = "item", required = true, value_parser = parse_item)]
    items: Vec<OrderItem>,
    #[arg(long, default_value = "cod")]
    method: PaymentMethod,
    #[arg(long)]
    coupon: Option<String>,
}

#[derive(Args)]
struct CancelArgs {
    id: Uuid,
    #[arg(long)]
    reason: Option<String>,
}

#[derive(Args)]
struct ReturnArgs {
    id: Uuid,
    #[arg(long)]
    reason: String,
    #[arg(long = "image")]
    images: Vec<PathBuf>,
}

#[derive(Args)]
struct RetryPaymentArgs {
    id: Uuid,
    #[arg(long)]
    method: Option<PaymentMethod>,
    /// Gateway payment id returned by the hosted checkout
    #[arg(long)]
    payment_id: Option<String>,
    /// Signature returned by the hosted checkout
    #[arg(long)]
    signature: Option<String>,
    /// Sign the payment locally (test gateways only)
    #[arg(long, env = "STOREFRONT_GATEWAY_SECRET")]
    gateway_secret: Option<String>,
}

#[derive(Args)]
struct CreditArgs {
    user_id: String,
    amount: Decimal,
    #[arg(long, default_value = "Manual top-up")]
    reason: String,
}

fn parse_item(raw: &str) -> Result<OrderItem, String> {
    let mut parts = raw.splitn(4, ':');
    let product_id = parts.next().filter(|s| !s.is_empty()).ok_or("missing sku")?;
    let quantity = parts
        .next()
        .ok_or("missing quantity")?
        .parse::<u32>()
        .map_err(|e| format!("invalid quantity: {}", e))?;
    let price = parts
        .next()
        .ok_or("missing price")
        .and_then(|p| Decimal::from_str(p).map_err(|_| "invalid price"))?;
    let product_name = parts.next().unwrap_or(product_id).to_string();

    Ok(OrderItem {
        product_id: product_id.to_string(),
        product_name,
        quantity,
        price,
    })
}

struct ConsoleNotifier {
    quiet: bool,
}

impl Notifier for ConsoleNotifier {
    fn success(&self, message: &str) {
        if !self.quiet {
            println!("ok: {}", message);
        }
    }

    fn error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

/// Stands in for the hosted checkout widget on the command line.
struct CommandLineGateway {
    payment_id: Option<String>,
    signature: Option<String>,
    secret: Option<String>,
}

#[async_trait]
impl CheckoutGateway for CommandLineGateway {
    async fn open(&self, session: &GatewayOrder) -> CheckoutOutcome {
        debug!(gateway_order_id = %session.gateway_order_id, amount = session.amount, "Checkout opened");

        let Some(payment_id) = self.payment_id.clone() else {
            return CheckoutOutcome::Failed {
                reason: "checkout dismissed".to_string(),
            };
        };
        let signature = match (&self.signature, &self.secret) {
            (Some(signature), _) => signature.clone(),
            (None, Some(secret)) => {
                sign_gateway_payment(secret, &session.gateway_order_id, &payment_id)
            }
            (None, None) => {
                return CheckoutOutcome::Failed {
                    reason: "no payment signature supplied".to_string(),
                }
            }
        };

        CheckoutOutcome::Completed {
            payment_id,
            signature,
        }
    }
}

async fn handle_orders_command(
    client: &StorefrontClient,
    notifier: &ConsoleNotifier,
    command: OrdersCommands,
    json: bool,
) -> Result<()> {
    match command {
        OrdersCommands::List => {
            let orders = if client.config().role == ViewerRole::Admin {
                client.admin_list_orders().await
            } else {
                client.list_orders().await
            }
            .context("failed to list orders")?;

            if json {
                print_json(&orders)?;
            } else if orders.is_empty() {
                println!("No orders found");
            } else {
                for order in &orders {
                    print_order_line(order);
                }
            }
        }
        OrdersCommands::Get(args) => {
            let order = client
                .get_order(args.id)
                .await
                .with_context(|| format!("failed to fetch order {}", args.id))?;
            if json {
                print_json(&order)?;
            } else {
                print_order_detail(&order);
            }
        }
        OrdersCommands::Place(args) => {
            let request = CheckoutRequest {
                items: args.items,
                payment_method: args.method,
                coupon_code: args.coupon,
            };
            let order = client
                .place_order(&request)
                .await
                .context("failed to place order")?;
            if json {
                print_json(&order)?;
            } else {
                println!(
                    "Placed order {} for {} ({})",
                    order.order.id, order.order.total_amount, order.order.payment_method
                );
            }
        }
        OrdersCommands::Cancel(args) => {
            let order = client
                .cancel_order(args.id, args.reason.as_deref())
                .await
                .with_context(|| format!("failed to cancel order {}", args.id))?;
            if json {
                print_json(&order)?;
            } else {
                println!("Order {} cancelled", order.order.id);
            }
        }
        OrdersCommands::Return(args) => {
            let mut attachments = Vec::with_capacity(args.images.len());
            for path in &args.images {
                let bytes = fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow!("{} is not a file", path.display()))?;
                attachments.push(ReturnAttachment {
                    file_name,
                    content_type: None,
                    bytes,
                });
            }

            let order = client
                .request_return(args.id, &args.reason, attachments)
                .await
                .with_context(|| format!("failed to request return for {}", args.id))?;
            if json {
                print_json(&order)?;
            } else {
                println!("Return requested for order {}", order.order.id);
            }
        }
        OrdersCommands::RetryPayment(args) => {
            let mut flow = PaymentRetryFlow::new(args.id);
            if let Some(method) = args.method {
                flow.select(method);
            }
            let gateway = CommandLineGateway {
                payment_id: args.payment_id,
                signature: args.signature,
                secret: args.gateway_secret,
            };

            // The flow already reported the failure through the notifier
            let Ok(order) = flow.submit(client, &gateway, notifier).await else {
                bail!("payment retry for order {} did not succeed", args.id);
            };
            if json {
                print_json(&order)?;
            }
        }
        OrdersCommands::Advance(args) => {
            let orders = client
                .admin_list_orders()
                .await
                .context("failed to load orders")?;
            let current = orders
                .iter()
                .find(|o| o.order.id == args.id)
                .ok_or_else(|| anyhow!("order {} not found", args.id))?;

            if let Some(button) = &current.actions.advance {
                debug!(label = %button.label, "Advancing order");
            }
            let Ok(order) = advance(client, notifier, args.id, current.order.order_status).await
            else {
                bail!("could not advance order {}", args.id);
            };
            if json {
                print_json(&order)?;
            }
        }
    }

    Ok(())
}

async fn handle_wallet_command(
    client: &StorefrontClient,
    command: WalletCommands,
    json: bool,
) -> Result<()> {
    let wallet = match command {
        WalletCommands::Show => client.wallet().await.context("failed to fetch wallet")?,
        WalletCommands::Credit(args) => client
            .credit_wallet(&args.user_id, args.amount, &args.reason)
            .await
            .with_context(|| format!("failed to credit wallet of {}", args.user_id))?,
    };

    if json {
        print_json(&wallet)?;
    } else {
        println!("Wallet of {}: balance {}", wallet.user_id, wallet.balance);
        for tx in &wallet.transactions {
            println!(
                "  {}  {:<6} {:>10}  {}",
                tx.created_at.format("%Y-%m-%d %H:%M"),
                tx.kind,
                tx.amount,
                tx.reason
            );
        }
    }
    Ok(())
}

fn print_order_line(view: &OrderView) {
    let order = &view.order;
    println!(
        "{}  {:<16} {:<8} {:<9} {:>10}",
        order.id, order.order_status, order.payment_status, order.payment_method, order.total_amount
    );
}

fn print_order_detail(view: &OrderView) {
    let order = &view.order;
    println!("Order {}", order.id);
    println!("  status:   {}", order.order_status);
    println!("  payment:  {} via {}", order.payment_status, order.payment_method);
    println!("  subtotal: {}", order.subtotal);
    if !order.discount.is_zero() {
        println!(
            "  discount: {} ({})",
            order.discount,
            order.coupon_code.as_deref().unwrap_or("-")
        );
    }
    println!("  total:    {}", order.total_amount);
    for item in &order.items {
        println!(
            "    {} x {} @ {}",
            item.quantity, item.product_name, item.price
        );
    }

    let actions = &view.actions;
    let mut offered = Vec::new();
    if actions.cancel {
        offered.push("cancel".to_string());
    }
    if actions.request_return {
        offered.push("return".to_string());
    }
    if actions.retry_payment {
        offered.push("retry-payment".to_string());
    }
    if actions.download_invoice {
        offered.push("invoice".to_string());
    }
    if let Some(button) = &actions.advance {
        offered.push(button.label.clone());
    }
    if !offered.is_empty() {
        println!("  actions:  {}", offered.join(", "));
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
