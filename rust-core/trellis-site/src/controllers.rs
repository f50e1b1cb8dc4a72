//! Demo controllers.

use trellis_core::{controller, App, FrameworkBuilder, Result};

/// Register every demo controller under its route key
pub fn register(builder: FrameworkBuilder) -> FrameworkBuilder {
    builder
        .controller::<Home>("home")
        .controller::<DocsGuide>("docs/guide")
}

/// Landing pages
#[derive(Debug, Default)]
pub struct Home;

#[controller]
impl Home {
    /// The front page; `?name=` personalises the greeting
    pub fn index(&mut self, app: &mut App<'_>) -> Result<()> {
        let greeting = match app.request().get("name").and_then(|v| v.as_str()) {
            Some(name) => format!("Hello, {name}."),
            None => "Hello.".to_string(),
        };

        let view = app.view_mut();
        view.assign("title", "Welcome");
        let id = view.create_block("homepage_content");
        view.set_template(id, "home.index").add_to(id, "content");
        if let Some(block) = view.block_mut(id) {
            block.assign("greeting", greeting);
        }
        Ok(())
    }

    /// Static about page
    pub fn about(&mut self, app: &mut App<'_>) -> Result<()> {
        let view = app.view_mut();
        view.assign("title", "About");
        let id = view.create_block("about_content");
        view.set_template(id, "home.about").add_to(id, "content");
        Ok(())
    }

    /// Plain-text health check, bypassing the layout
    pub fn ping(&mut self, app: &mut App<'_>) -> Result<()> {
        app.view_mut().auto_render(false);
        app.echo("pong");
        Ok(())
    }
}

/// Guide pages under `templates/docs`
#[derive(Debug, Default)]
pub struct DocsGuide;

#[controller]
impl DocsGuide {
    /// Render the guide page named by the first argument
    pub fn show(&mut self, app: &mut App<'_>, args: &[String]) -> Result<()> {
        let Some(page) = args.first() else {
            return app.abort(404);
        };
        let template = format!("docs.{page}");
        if app.view().templates().find(&template).is_none() {
            return app.abort(404);
        }

        let view = app.view_mut();
        view.assign("title", title(page));
        let id = view.create_block("guide_page");
        view.set_template(id, &template).add_to(id, "content");
        Ok(())
    }
}

fn title(page: &str) -> String {
    let mut chars = page.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
