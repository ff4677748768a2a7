mod overview;
mod user_detail;

pub use overview::OverviewView;
pub use user_detail::UserDetailView;
