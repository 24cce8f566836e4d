//! Link command implementation

use crate::db::Link;

pub fn print_link(link: &Link) {
    print!("• {} --{}--> {}", link.src_id, link.link_type, link.dst_id);
    match link.weight {
        Some(weight) => println!(" (weight {})", weight),
        None => println!(),
    }
    println!("  ID: {}", link.id);
    if !link.attrs.is_empty() {
        println!(
            "  Attrs: {}",
            serde_json::Value::Object(link.attrs.clone())
        );
    }
}

pub fn print_links(links: &[Link]) {
    if links.is_empty() {
        println!("No links found.");
        return;
    }
    for link in links {
        print_link(link);
    }
}
