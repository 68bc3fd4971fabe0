// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;

use crate::collection::Collection;
use crate::drill::server::start_server;
use crate::error::Fallible;
use crate::stats::print_stats;
use crate::types::timestamp::Timestamp;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Study eligible cards.
    Drill {
        /// Optional path to the collection directory.
        directory: Option<String>,
        /// Restrict the session to one deck.
        #[arg(long)]
        deck: Option<String>,
        /// Maximum number of cards in the session.
        #[arg(long)]
        limit: Option<usize>,
        /// Show the back of each card as the prompt.
        #[arg(long)]
        reverse: bool,
        /// Port for the local server.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Add a card to the collection.
    Add {
        /// The front (question) side.
        front: String,
        /// The back (answer) side.
        back: String,
        /// The deck the card belongs to.
        #[arg(long, default_value = "default")]
        deck: String,
        /// Optional path to the collection directory.
        #[arg(long)]
        directory: Option<String>,
    },
    /// Print collection statistics as JSON.
    Stats {
        /// Optional path to the collection directory.
        directory: Option<String>,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Drill {
            directory,
            deck,
            limit,
            reverse,
            port,
        } => start_server(directory, deck, limit, reverse, port).await,
        Command::Add {
            front,
            back,
            deck,
            directory,
        } => {
            let collection = Collection::new(directory)?;
            let card_id = collection
                .db
                .add_card(&deck, &front, &back, Timestamp::now())?;
            println!("Added card {card_id} to deck '{deck}'.");
            Ok(())
        }
        Command::Stats { directory } => print_stats(directory),
    }
}
