use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use listing_market::client::ApiClient;
use listing_market::config::ClientConfig;
use listing_market::filters::{FilterField, FilterState};
use listing_market::listings::{ListingBrowser, ListingsView, SortKey};
use listing_market::models::{Credentials, NewUser, Property};
use listing_market::notify::TracingNotifier;
use listing_market::session::{AuthSession, SessionState};
use secrecy::SecretString;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "listing-market")]
#[command(author, version, about = "Browse and manage real-estate listings")]
struct Cli {
    /// Marketplace origin (overrides MARKET_API_URL)
    #[arg(long, global = true)]
    api_url: Option<Url>,

    /// Log in with this username before running the command
    #[arg(long, global = true, env = "MARKET_USERNAME")]
    username: Option<String>,

    #[arg(long, global = true, env = "MARKET_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use the admin login endpoint
    #[arg(long, global = true)]
    admin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search listings
    Listings(ListingsArgs),
    /// Show a single listing
    Listing { id: i64 },
    /// Show the current session
    Whoami,
    /// Create an account
    Register(RegisterArgs),
    /// Confirm an email address with the emailed code
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
    /// Email a verification code
    RequestVerification {
        #[arg(long)]
        email: String,
    },
    /// Email a fresh verification code
    ResendVerification {
        #[arg(long)]
        email: String,
    },
    /// Listings owned by the logged-in user
    MyListings,
    /// Favorite listings of the logged-in user
    Favorites,
    /// Add or remove a listing from favorites
    ToggleFavorite { id: i64 },
    /// Listings awaiting moderation (admin)
    Pending,
    /// Approve a listing (admin)
    Approve { id: i64 },
    /// End the session
    Logout,
}

#[derive(Args)]
struct ListingsArgs {
    /// Page query string to seed filters from, e.g. "listingType=sale&city=Oslo"
    #[arg(long)]
    query: Option<String>,
    #[arg(long)]
    listing_type: Option<String>,
    #[arg(long)]
    property_type: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    district: Option<String>,
    #[arg(long)]
    price_min: Option<String>,
    #[arg(long)]
    price_max: Option<String>,
    #[arg(long)]
    rooms: Option<String>,
    #[arg(long)]
    area: Option<String>,
    /// newest, price_asc, price_desc, area_asc or area_desc
    #[arg(long, default_value = "newest")]
    sort: SortKey,
    /// Write the results to a JSON file
    #[arg(long)]
    out: Option<PathBuf>,
}

impl ListingsArgs {
    fn filter_state(&self) -> FilterState {
        let mut state = FilterState::from_query(self.query.as_deref().unwrap_or_default());
        let flags = [
            (FilterField::ListingType, &self.listing_type),
            (FilterField::PropertyType, &self.property_type),
            (FilterField::Region, &self.region),
            (FilterField::City, &self.city),
            (FilterField::District, &self.district),
            (FilterField::PriceMin, &self.price_min),
            (FilterField::PriceMax, &self.price_max),
            (FilterField::Rooms, &self.rooms),
            (FilterField::Area, &self.area),
        ];
        for (field, value) in flags {
            if let Some(value) = value {
                state.set_field(field, value.clone());
            }
        }
        state.submit();
        state
    }
}

#[derive(Args)]
struct RegisterArgs {
    #[arg(long)]
    new_username: String,
    #[arg(long, env = "MARKET_NEW_PASSWORD", hide_env_values = true)]
    new_password: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    middle_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Failed to load configuration")?;
    if let Some(api_url) = cli.api_url.clone() {
        config.api_url = api_url;
    }

    info!("🏠 Listing Market @ {}", config.api_url);

    let client = ApiClient::new(&config)?;
    let session = AuthSession::new(client.clone(), Arc::new(TracingNotifier));
    session.refresh().await;

    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        let credentials = Credentials::new(username.as_str(), password.as_str());
        if cli.admin {
            session.admin_login(&credentials).await?;
        } else {
            session.login(&credentials).await?;
        }
    }

    match cli.command {
        Commands::Listings(args) => {
            let mut browser = ListingBrowser::with_filters(client, args.filter_state());
            browser.set_sort(args.sort);

            info!("Searching listings...");
            match browser.search().await {
                ListingsView::Results(listings) => {
                    print_listings(&listings);
                    if let Some(out) = &args.out {
                        let json = serde_json::to_string_pretty(&listings)?;
                        tokio::fs::write(out, json).await?;
                        info!("💾 Saved {} listings to {}", listings.len(), out.display());
                    }
                }
                ListingsView::NotSearched | ListingsView::NothingFound => {
                    println!("Nothing found. Try again without filters: listing-market listings");
                }
                ListingsView::Failed(message) => anyhow::bail!("Failed to load listings: {message}"),
            }
        }
        Commands::Listing { id } => {
            let listing = client.listing(id).await?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Commands::Whoami => print_session(&session.state()),
        Commands::Register(args) => {
            let new_user = NewUser {
                username: args.new_username,
                password: SecretString::from(args.new_password),
                email: args.email,
                first_name: args.first_name,
                last_name: args.last_name,
                middle_name: args.middle_name,
                phone: args.phone,
            };
            session.register(&new_user).await?;
            print_session(&session.state());
        }
        Commands::Verify { email, code } => {
            session.verify_email_code(&email, &code).await?;
            print_session(&session.state());
        }
        Commands::RequestVerification { email } => session.request_verification(&email).await?,
        Commands::ResendVerification { email } => session.resend_verification(&email).await?,
        Commands::MyListings => print_listings(&client.my_listings().await?),
        Commands::Favorites => print_listings(&client.favorites().await?),
        Commands::ToggleFavorite { id } => {
            let favorited = client.toggle_favorite(id).await?;
            println!("Listing {id} {}", if favorited { "added to favorites" } else { "removed from favorites" });
        }
        Commands::Pending => print_listings(&client.pending_listings().await?),
        Commands::Approve { id } => {
            let listing = client.approve_listing(id).await?;
            println!("Approved {}. {}", listing.id, listing.title);
        }
        Commands::Logout => session.logout().await?,
    }

    Ok(())
}

fn print_listings(listings: &[Property]) {
    info!("✅ {} listings\n", listings.len());

    for (i, listing) in listings.iter().enumerate() {
        println!("{}. {} ({})", i + 1, listing.title, listing.price);
        println!("   {} · {} · {} m²", listing.listing_type, listing.property_type, listing.area);
        println!("   {}, {}, {}", listing.location.address, listing.location.city, listing.location.region);
        if let Some(rooms) = listing.rooms {
            println!("   Rooms: {}", rooms);
        }
        println!("   ID: {}", listing.id);
        println!();
    }
}

fn print_session(state: &SessionState) {
    match state {
        SessionState::Authenticated(user) => {
            let verified = if user.is_verified { "verified" } else { "not verified" };
            println!("Logged in as {} <{}> ({verified})", user.username, user.email);
            if user.is_admin {
                println!("Administrator");
            }
        }
        SessionState::Anonymous => println!("Not logged in"),
        SessionState::Loading => println!("Session not checked"),
        SessionState::Error(message) => println!("Session check failed: {message}"),
    }
}
