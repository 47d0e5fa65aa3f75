//! Built-in greetings handed out while the store has no messages yet.
//! They are never persisted, so they cannot be rippled.

use rand::Rng;
use uuid::Uuid;

use ripple_types::models::{Category, Message, NewMessage, now_micros};

const STARTERS: [(Category, &str, &str); 5] = [
    (
        Category::Kindness,
        "Terima kasih telah selalu menyebarkan kebaikan di sekitar Anda. Dunia menjadi tempat yang lebih baik karena Anda.",
        "Indonesia",
    ),
    (
        Category::Hardwork,
        "Kerja keras dan dedikasi Anda sangat menginspirasi. Teruslah berjuang, hasil yang luar biasa menanti!",
        "Malaysia",
    ),
    (
        Category::Friendship,
        "Persahabatan seperti Anda adalah hadiah yang sangat berharga. Terima kasih telah menjadi teman yang luar biasa.",
        "Singapore",
    ),
    (
        Category::Help,
        "Bantuan yang Anda berikan sangat berarti. Anda telah membuat perbedaan besar dalam hidup seseorang.",
        "Thailand",
    ),
    (
        Category::Inspiration,
        "Anda adalah sumber inspirasi bagi banyak orang. Teruslah bersinar dan menginspirasi dunia!",
        "Philippines",
    ),
];

pub fn starter_messages() -> Vec<Message> {
    STARTERS
        .iter()
        .enumerate()
        .map(|(i, (category, text, country))| {
            NewMessage::root(text.to_string(), *category, Some(country.to_string()))
                .into_message(Uuid::from_u128(i as u128 + 1), now_micros())
        })
        .collect()
}

pub fn random_starter() -> Message {
    let mut starters = starter_messages();
    let idx = rand::rng().random_range(0..starters.len());
    starters.swap_remove(idx)
}
