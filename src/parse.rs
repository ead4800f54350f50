use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tokio::task::spawn_blocking;

use crate::{Error, Result};

const ROUNDS: [&str; 2] = ["jeopardy_round", "double_jeopardy_round"];

/// A clue as it comes off the game board, before any enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapedClue {
    /// Only set for final round clues, which are stored flat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub q: String,
    pub a: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapedCategory {
    pub category: String,
    pub questions: Vec<ScrapedClue>,
}

/// Everything usable on one game page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Game {
    pub categories: Vec<ScrapedCategory>,
    pub final_clue: Option<ScrapedClue>,
}

/// Parses a game page off the async runtime, the html parser is blocking and `!Send`.
pub(crate) async fn parse_game(html: String) -> Result<Game> {
    spawn_blocking(move || parse_game_html(&html)).await?
}

/// Extracts the single and double round categories plus the final clue.
///
/// A category is dropped if any of its questions contains a link (those are
/// usually picture or video clues that make no sense as text) or if none of
/// its clues had a correct response.
pub fn parse_game_html(html: &str) -> Result<Game> {
    let doc = Html::parse_document(html);

    // Create selectors.
    let category_selector = create_selector("td.category_name")?;
    let clue_selector = create_selector("td.clue")?;
    let cell_selector = create_selector("td[id]")?;
    let link_selector = create_selector("a")?;

    let mut game = Game::default();
    // Exclusions carry over between rounds, same name means same category.
    let mut excluded = HashSet::new();

    for round_id in ROUNDS {
        let round_selector = create_selector(&format!("div#{round_id}"))?;
        let Some(round) = doc.select(&round_selector).next() else {
            continue;
        };

        let names: Vec<String> = round.select(&category_selector).map(stripped_text).collect();
        let mut columns: Vec<Vec<ScrapedClue>> = vec![Vec::new(); names.len()];

        for clue in round.select(&clue_selector) {
            let Some((question, column)) = clue
                .select(&cell_selector)
                .find_map(|cell| question_column(cell.value().id()?).map(|col| (cell, col)))
            else {
                continue;
            };
            let Some(name) = names.get(column) else {
                continue;
            };

            if question.select(&link_selector).next().is_some() {
                excluded.insert(name.clone());
            }

            let Some(question_id) = question.value().id() else {
                continue;
            };
            let answer_selector = create_selector(&format!("td#{question_id}_r em.correct_response"))?;
            if let Some(answer) = doc.select(&answer_selector).next() {
                columns[column].push(ScrapedClue {
                    category: None,
                    q: raw_text(question),
                    a: raw_text(answer),
                });
            }
        }

        for (name, questions) in names.into_iter().zip(columns) {
            if !questions.is_empty() && !excluded.contains(&name) {
                game.categories.push(ScrapedCategory {
                    category: name,
                    questions,
                });
            }
        }
    }

    game.final_clue = parse_final(&doc)?;
    Ok(game)
}

fn parse_final(doc: &Html) -> Result<Option<ScrapedClue>> {
    let final_selector = create_selector("div#final_jeopardy_round")?;
    let Some(final_round) = doc.select(&final_selector).next() else {
        return Ok(None);
    };

    let category = final_round.select(&create_selector("td.category_name")?).next();
    let question = final_round.select(&create_selector("td#clue_FJ")?).next();
    let answer = final_round
        .select(&create_selector("td#clue_FJ_r em.correct_response")?)
        .next();

    Ok(match (category, question, answer) {
        (Some(category), Some(question), Some(answer)) => Some(ScrapedClue {
            category: Some(raw_text(category)),
            q: raw_text(question),
            a: raw_text(answer),
        }),
        _ => None,
    })
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// `clue_J_3_2` / `clue_DJ_6_5` -> zero based category column.
/// Anything else, answer cells (`..._r`) included, isn't a question cell.
fn question_column(id: &str) -> Option<usize> {
    let mut parts = id.split('_');
    let (Some("clue"), Some("J" | "DJ"), Some(col), Some(row), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    if !is_number(row) || !is_number(col) {
        return None;
    }
    col.parse::<usize>().ok()?.checked_sub(1)
}

#[inline]
fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// All text inside the element, untouched.
fn raw_text(el: ElementRef) -> String {
    el.text().collect()
}

/// Every text node trimmed, blanks dropped, glued back together.
fn stripped_text(el: ElementRef) -> String {
    el.text().map(str::trim).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const GAME_HTML: &str = r#"
<html><body>
<div id="jeopardy_round">
  <table class="round">
    <tr>
      <td class="category"><table><tr><td class="category_name"> WORLD <b>CAPITALS</b> </td></tr></table></td>
      <td class="category"><table><tr><td class="category_name">SEEN &amp; HEARD</td></tr></table></td>
      <td class="category"><table><tr><td class="category_name">EMPTY</td></tr></table></td>
    </tr>
    <tr>
      <td class="clue"><table>
        <tr><td id="clue_J_1_1" class="clue_text">It's the city of light</td></tr>
        <tr><td id="clue_J_1_1_r" class="clue_text"><em class="correct_response">Paris</em></td></tr>
      </table></td>
      <td class="clue"><table>
        <tr><td id="clue_J_2_1" class="clue_text">(<a href="media.jpg">Sarah</a>) This bird</td></tr>
        <tr><td id="clue_J_2_1_r" class="clue_text"><em class="correct_response">a robin</em></td></tr>
      </table></td>
      <td class="clue"><table>
        <tr><td id="clue_J_3_1" class="clue_text">Nobody got this</td></tr>
      </table></td>
    </tr>
    <tr>
      <td class="clue"><table>
        <tr><td id="clue_J_1_2" class="clue_text">Home of the <i>Atomium</i></td></tr>
        <tr><td id="clue_J_1_2_r" class="clue_text"><em class="correct_response">Brussels</em></td></tr>
      </table></td>
      <td class="clue"></td>
      <td class="clue"></td>
    </tr>
  </table>
</div>
<div id="double_jeopardy_round">
  <table class="round">
    <tr>
      <td class="category"><table><tr><td class="category_name">SEEN &amp; HEARD</td></tr></table></td>
      <td class="category"><table><tr><td class="category_name">RIVERS</td></tr></table></td>
    </tr>
    <tr>
      <td class="clue"><table>
        <tr><td id="clue_DJ_1_1" class="clue_text">Now without a link</td></tr>
        <tr><td id="clue_DJ_1_1_r" class="clue_text"><em class="correct_response">a sparrow</em></td></tr>
      </table></td>
      <td class="clue"><table>
        <tr><td id="clue_DJ_2_1" class="clue_text">Longest in Africa</td></tr>
        <tr><td id="clue_DJ_2_1_r" class="clue_text"><em class="correct_response">the Nile</em></td></tr>
      </table></td>
    </tr>
  </table>
</div>
<div id="final_jeopardy_round">
  <table class="final_round">
    <tr><td class="category"><table><tr><td class="category_name">ÉCRIVAINS</td></tr></table></td></tr>
    <tr><td class="clue"><table>
      <tr><td id="clue_FJ" class="clue_text">He wrote "Les Misérables"</td></tr>
      <tr><td id="clue_FJ_r" class="clue_text"><em class="correct_response">Victor Hugo</em></td></tr>
    </table></td></tr>
  </table>
</div>
</body></html>"#;

    #[test]
    fn question_column_only_accepts_question_cells() {
        assert_eq!(question_column("clue_J_1_1"), Some(0));
        assert_eq!(question_column("clue_DJ_6_5"), Some(5));
        assert_eq!(question_column("clue_J_1_1_r"), None);
        assert_eq!(question_column("clue_FJ"), None);
        assert_eq!(question_column("clue_J_x_1"), None);
        assert_eq!(question_column("clue_J_0_1"), None);
    }

    #[tokio::test]
    async fn parses_rounds_and_final() {
        let game = parse_game(GAME_HTML.to_string()).await.unwrap();

        assert_eq!(game.categories.len(), 2);
        let capitals = &game.categories[0];
        assert_eq!(capitals.category, "WORLDCAPITALS");
        let answers: Vec<_> = capitals.questions.iter().map(|c| c.a.as_str()).collect();
        assert_eq!(answers, ["Paris", "Brussels"]);
        assert_eq!(capitals.questions[1].q, "Home of the Atomium");

        // Linked in the first round, so it stays excluded in the second.
        assert!(game.categories.iter().all(|c| c.category != "SEEN & HEARD"));
        assert!(game.categories.iter().all(|c| c.category != "EMPTY"));
        assert_eq!(game.categories[1].category, "RIVERS");

        let final_clue = game.final_clue.unwrap();
        assert_eq!(final_clue.category.as_deref(), Some("ÉCRIVAINS"));
        assert_eq!(final_clue.a, "Victor Hugo");
    }

    #[test]
    fn empty_page_has_nothing() {
        let game = parse_game_html("<html><body><p>ERROR: No game 9999 in database.</p></body></html>").unwrap();
        assert_eq!(game, Game::default());
    }
}
