mod factory;
mod supabase_adapter;

pub use factory::SupabaseAdapterFactory;
pub use supabase_adapter::SupabaseAdapter;
