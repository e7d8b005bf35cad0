pub mod header;
pub mod help_overlay;
pub mod player_bar;
pub mod purchase_modal;
pub mod track_list;
